//! Songbird-backed [`VoiceTransport`] and [`AudioOutput`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    handoff::{Completion, CompletionSender},
    output::{AudioOutput, ConnectionHandle, StreamId, VoiceTransport},
};

/// Avisa al dispatcher cuando un track termina o falla
struct TrackEndNotifier {
    guild_id: GuildId,
    stream: StreamId,
    completions: CompletionSender,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        debug!("🎵 Track {} terminó en guild {}", self.stream, self.guild_id);
        self.completions.notify(Completion {
            guild_id: self.guild_id,
            stream: self.stream,
            error,
        });

        None
    }
}

pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    tracks: DashMap<GuildId, (StreamId, TrackHandle)>,
    completions: CompletionSender,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>, completions: CompletionSender) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            manager,
            http,
            tracks: DashMap::new(),
            completions,
        })
    }

    fn register_events(&self, guild_id: GuildId, stream: StreamId, handle: &TrackHandle) -> Result<()> {
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id,
                        stream,
                        completions: self.completions.clone(),
                    },
                )
                .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        }
        Ok(())
    }
}

/// Solo URLs http(s) con host llegan a songbird.
fn validate_stream_uri(uri: &str) -> Result<()> {
    let url = Url::parse(uri).with_context(|| format!("URL de stream inválida: {}", uri))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        anyhow::bail!("URL de stream no soportada: {}", uri);
    }
    Ok(())
}

#[async_trait]
impl VoiceTransport for SongbirdBackend {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<ConnectionHandle> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .with_context(|| format!("Error al conectar al canal de voz {}", channel_id))?;

        Ok(ConnectionHandle {
            guild_id,
            channel_id,
        })
    }

    async fn disconnect(&self, connection: &ConnectionHandle) -> Result<()> {
        if let Some((_, (_, handle))) = self.tracks.remove(&connection.guild_id) {
            let _ = handle.stop();
        }

        if self.manager.get(connection.guild_id).is_some() {
            self.manager.remove(connection.guild_id).await?;
        }
        Ok(())
    }

    async fn is_connected(&self, connection: &ConnectionHandle) -> bool {
        match self.manager.get(connection.guild_id) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }
}

#[async_trait]
impl AudioOutput for SongbirdBackend {
    async fn start_stream(&self, connection: &ConnectionHandle, stream: StreamId, uri: &str) -> Result<()> {
        validate_stream_uri(uri)?;

        let call = self
            .manager
            .get(connection.guild_id)
            .context("Sin llamada de voz para la guild")?;

        let input = HttpRequest::new(self.http.clone(), uri.to_string());
        let handle = call.lock().await.play_only_input(input.into());

        if let Err(e) = self.register_events(connection.guild_id, stream, &handle) {
            let _ = handle.stop();
            return Err(e);
        }

        if let Some((old, previous)) = self.tracks.insert(connection.guild_id, (stream, handle)) {
            debug!("Reemplazando stream {} en guild {}", old, connection.guild_id);
            let _ = previous.stop();
        }

        info!("▶️ Stream {} iniciado en guild {}", stream, connection.guild_id);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        if let Some((_, (stream, handle))) = self.tracks.remove(&guild_id) {
            // falla si el track ya terminó; no importa
            if let Err(e) = handle.stop() {
                debug!("Stream {} ya había terminado en guild {}: {}", stream, guild_id, e);
            }
        }
    }

    async fn pause(&self, guild_id: GuildId) -> Result<()> {
        let entry = self.tracks.get(&guild_id).context("No hay stream activo")?;
        entry.1.pause().map_err(|e| anyhow::anyhow!("Error al pausar: {}", e))
    }

    async fn resume(&self, guild_id: GuildId) -> Result<()> {
        let entry = self.tracks.get(&guild_id).context("No hay stream activo")?;
        entry.1.play().map_err(|e| {
            warn!("⚠️ Error al reanudar en guild {}: {}", guild_id, e);
            anyhow::anyhow!("Error al reanudar: {}", e)
        })
    }
}
