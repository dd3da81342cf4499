use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{input::search_target, ExtractedMedia, ExtractionService, SearchHit};

/// Cliente para yt-dlp
pub struct YtDlpClient {
    binary: String,
    timeout: Duration,
    max_playlist_items: usize,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    url: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    /// Si yt-dlp devolvió una colección, se queda con la primera entrada.
    fn into_first(self) -> Option<YtDlpInfo> {
        match self.entries {
            Some(entries) => entries.into_iter().flatten().next(),
            None => Some(self),
        }
    }

    fn into_media(self) -> ExtractedMedia {
        ExtractedMedia {
            stream_uri: self.url.filter(|u| !u.is_empty()),
            title: self.title,
            canonical_uri: self.webpage_url.or(self.original_url),
        }
    }
}

impl YtDlpClient {
    pub fn new(binary: impl Into<String>, timeout: Duration, concurrency: usize, max_playlist_items: usize) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            max_playlist_items,
            rate_limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    /// Ejecuta yt-dlp y devuelve stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = tokio::time::timeout(self.timeout, Command::new(&self.binary).args(args).kill_on_drop(true).output())
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {:?}", self.timeout))?
            .context("Error al ejecutar yt-dlp")?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        // Con --ignore-errors yt-dlp puede salir con error y aun así imprimir JSON útil
        if !output.status.success() && stdout.trim().is_empty() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(stdout)
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("yt-dlp no puede ejecutarse correctamente");
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn parse_info(stdout: &str) -> Result<Option<YtDlpInfo>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let info: YtDlpInfo = serde_json::from_str(trimmed).context("Error al parsear respuesta de yt-dlp")?;
    Ok(Some(info))
}

pub(crate) fn parse_media(stdout: &str) -> Result<Option<ExtractedMedia>> {
    Ok(parse_info(stdout)?
        .and_then(YtDlpInfo::into_first)
        .map(YtDlpInfo::into_media))
}

pub(crate) fn parse_search_hit(stdout: &str) -> Result<Option<SearchHit>> {
    let hit = parse_info(stdout)?.and_then(YtDlpInfo::into_first).and_then(|info| {
        let canonical = info.webpage_url.or(info.url)?;
        Some(SearchHit {
            canonical_uri: canonical,
            title: info.title,
        })
    });
    Ok(hit)
}

pub(crate) fn parse_collection_links(stdout: &str, limit: usize) -> Result<Vec<String>> {
    let Some(info) = parse_info(stdout)? else {
        return Ok(Vec::new());
    };

    let links = info
        .entries
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.webpage_url.or(entry.url))
        .filter(|link| !link.is_empty())
        .take(limit)
        .collect();

    Ok(links)
}

#[async_trait]
impl ExtractionService for YtDlpClient {
    async fn resolve_one(&self, target: &str) -> Result<Option<ExtractedMedia>> {
        debug!("📊 Obteniendo stream de: {}", target);

        let stdout = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--dump-single-json",
                "--ignore-errors",
                "--no-warnings",
                "--quiet",
                "--playlist-items",
                "1",
                target,
            ])
            .await?;

        parse_media(&stdout)
    }

    async fn search_first(&self, query: &str) -> Result<Option<SearchHit>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let target = search_target(query);
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-single-json",
                "--ignore-errors",
                "--no-warnings",
                "--quiet",
                &target,
            ])
            .await?;

        parse_search_hit(&stdout)
    }

    async fn expand_collection(&self, uri: &str) -> Result<Vec<String>> {
        info!("📋 Obteniendo playlist: {}", uri);

        let limit = self.max_playlist_items.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-single-json",
                "--ignore-errors",
                "--no-warnings",
                "--quiet",
                "--playlist-end",
                &limit,
                uri,
            ])
            .await?;

        let links = parse_collection_links(&stdout, self.max_playlist_items)?;
        if links.is_empty() {
            warn!("📭 La playlist no tiene entradas: {}", uri);
        }
        Ok(links)
    }
}
