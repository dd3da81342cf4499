use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info};

use super::{MetadataCollection, MetadataItem, MetadataKind, MetadataService};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Margen antes de que expire el token para pedir uno nuevo
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

impl SpotifyTrack {
    fn into_item(self) -> MetadataItem {
        MetadataItem {
            artist: self.artists.into_iter().next().map(|a| a.name).unwrap_or_default(),
            title: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    name: String,
    tracks: Page<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    tracks: Page<SpotifyTrack>,
}

/// Cliente de la Web API de Spotify con client credentials
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
    max_items: usize,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, max_items: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client_id,
            client_secret,
            client,
            token: Mutex::new(None),
            max_items,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;

        if let Some(current) = token.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < current.expires_at {
                return Ok(current.value.clone());
            }
        }

        debug!("🔑 Solicitando token de Spotify");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ Spotify auth error: {} - {}", status, error_text);
            anyhow::bail!("Spotify auth error: {}", status);
        }

        let fresh: TokenResponse = response.json().await?;
        let value = fresh.access_token.clone();
        *token = Some(AccessToken {
            value: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });

        Ok(value)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ Spotify API error: {} - {}", status, error_text);
            anyhow::bail!("Spotify API error: {}", status);
        }

        Ok(response.json().await?)
    }

    /// Recorre las páginas siguientes hasta completar `max_items`
    async fn follow_pages<T: serde::de::DeserializeOwned>(
        &self,
        first: Page<T>,
        keep: impl Fn(T) -> Option<MetadataItem>,
    ) -> Result<Vec<MetadataItem>> {
        let mut items = collect_page(first.items, &keep, self.max_items);
        let mut next = first.next;

        while let Some(url) = next.take() {
            if items.len() >= self.max_items {
                break;
            }
            let page: Page<T> = self.get(&url).await?;
            let remaining = self.max_items - items.len();
            items.extend(collect_page(page.items, &keep, remaining));
            next = page.next;
        }

        Ok(items)
    }
}

fn collect_page<T>(page: Vec<T>, keep: &impl Fn(T) -> Option<MetadataItem>, limit: usize) -> Vec<MetadataItem> {
    page.into_iter().filter_map(keep).take(limit).collect()
}

fn playlist_entry(entry: PlaylistEntry) -> Option<MetadataItem> {
    // Spotify devuelve track null para episodios borrados o locales
    entry.track.map(SpotifyTrack::into_item)
}

fn album_track(track: SpotifyTrack) -> Option<MetadataItem> {
    Some(track.into_item())
}

#[async_trait]
impl MetadataService for SpotifyClient {
    async fn lookup_item(&self, id: &str) -> Result<MetadataItem> {
        let track: SpotifyTrack = self.get(&format!("{}/tracks/{}", API_BASE, id)).await?;
        Ok(track.into_item())
    }

    async fn lookup_collection(&self, kind: MetadataKind, id: &str) -> Result<MetadataCollection> {
        let collection = match kind {
            MetadataKind::Playlist => {
                let playlist: SpotifyPlaylist = self.get(&format!("{}/playlists/{}", API_BASE, id)).await?;
                MetadataCollection {
                    name: playlist.name,
                    items: self.follow_pages(playlist.tracks, playlist_entry).await?,
                }
            }
            MetadataKind::Album => {
                let album: SpotifyAlbum = self.get(&format!("{}/albums/{}", API_BASE, id)).await?;
                MetadataCollection {
                    name: album.name,
                    items: self.follow_pages(album.tracks, album_track).await?,
                }
            }
            MetadataKind::Track => {
                let item = self.lookup_item(id).await?;
                MetadataCollection {
                    name: item.search_text(),
                    items: vec![item],
                }
            }
        };

        info!(
            "📝 Spotify {} '{}' con {} canciones",
            kind.as_str(),
            collection.name,
            collection.items.len()
        );
        Ok(collection)
    }
}
