//! Entry point for the slash commands.
//!
//! [`AudioPlayer`] ties the resolver to the session store: it checks
//! preconditions, resolves input outside of the session worker (resolution
//! may take seconds) and forwards everything else to the guild's session.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    session::SessionStatus,
    store::{SessionHandle, SessionStore},
};
use crate::{
    error::{PlaybackError, PlaybackResult},
    sources::{Track, TrackResolver},
};

/// What a `/play` achieved, for the reply message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayOutcome {
    pub added: usize,
    pub attempted: usize,
    pub collection: Option<String>,
    pub first_title: Option<String>,
    /// Playback started because of this request (the session was idle).
    pub started: bool,
}

impl PlayOutcome {
    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.added)
    }

    pub fn nothing_found(&self) -> bool {
        self.added == 0
    }
}

pub struct AudioPlayer {
    store: Arc<SessionStore>,
    resolver: TrackResolver,
}

impl AudioPlayer {
    pub fn new(store: Arc<SessionStore>, resolver: TrackResolver) -> Self {
        Self { store, resolver }
    }

    /// Reproduce o encola lo que el usuario pidió.
    ///
    /// `voice_channel` es el canal donde está quien pidió la canción; sin él
    /// la petición se rechaza antes de tocar nada.
    pub async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
        query: &str,
    ) -> PlaybackResult<PlayOutcome> {
        let channel_id = voice_channel.ok_or(PlaybackError::NoVoicePresence)?;
        let handle = self.connected_session(guild_id, channel_id).await?;

        info!("🔍 Resolviendo '{}' para guild {}", query, guild_id);
        let resolution = self.resolver.resolve(query).await;
        if resolution.failed() > 0 {
            warn!(
                "⚠️ {} de {} entradas no se pudieron resolver para '{}'",
                resolution.failed(),
                resolution.attempted,
                query
            );
        }

        let mut outcome = PlayOutcome {
            added: resolution.added(),
            attempted: resolution.attempted,
            collection: resolution.collection,
            first_title: resolution.tracks.first().map(|t| t.title().to_string()),
            started: false,
        };

        if outcome.nothing_found() {
            info!("📭 Nada reproducible para '{}' en guild {}", query, guild_id);
            return Ok(outcome);
        }

        outcome.started = self.enqueue(handle, channel_id, resolution.tracks).await?;
        info!(
            "➕ {} de {} canciones agregadas en guild {}",
            outcome.added, outcome.attempted, guild_id
        );
        Ok(outcome)
    }

    /// The session may be reaped or left while resolution was running; in that
    /// case a fresh one is created and connected once.
    async fn enqueue(&self, handle: SessionHandle, channel_id: ChannelId, tracks: Vec<Track>) -> PlaybackResult<bool> {
        match handle.enqueue(tracks.clone()).await {
            Err(PlaybackError::SessionClosed) => {
                debug!("Sesión cerrada durante la resolución en guild {}", handle.guild_id());
                let handle = self.connected_session(handle.guild_id(), channel_id).await?;
                handle.enqueue(tracks).await
            }
            result => result,
        }
    }

    async fn connected_session(&self, guild_id: GuildId, channel_id: ChannelId) -> PlaybackResult<SessionHandle> {
        let handle = self.store.get_or_create(guild_id);
        match handle.ensure_connected(channel_id).await {
            Ok(()) => Ok(handle),
            Err(PlaybackError::SessionClosed) => {
                let handle = self.store.get_or_create(guild_id);
                handle.ensure_connected(channel_id).await?;
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.existing(guild_id, PlaybackError::NothingPlaying)?.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.existing(guild_id, PlaybackError::NothingPaused)?.resume().await
    }

    pub async fn skip(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.existing(guild_id, PlaybackError::NothingPlaying)?.skip().await
    }

    /// Vacía la cola y corta el stream; sin sesión no hay nada que hacer.
    pub async fn stop(&self, guild_id: GuildId) -> PlaybackResult<()> {
        match self.store.get(guild_id) {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> PlaybackResult<bool> {
        self.store.get_or_create(guild_id).toggle_loop().await
    }

    pub async fn status(&self, guild_id: GuildId) -> SessionStatus {
        match self.store.get(guild_id) {
            Some(handle) => handle.status().await.unwrap_or_else(|_| SessionStatus::empty()),
            None => SessionStatus::empty(),
        }
    }

    pub async fn leave(&self, guild_id: GuildId) -> PlaybackResult<()> {
        let handle = self.existing(guild_id, PlaybackError::NotConnected)?;
        match handle.leave().await {
            Ok(()) | Err(PlaybackError::SessionClosed) => {
                self.store.remove(&handle);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The bot was moved out of voice by someone else.
    pub fn connection_lost(&self, guild_id: GuildId) {
        if let Some(handle) = self.store.get(guild_id) {
            if handle.connection_lost().is_err() {
                debug!("Sesión de guild {} ya cerrada", guild_id);
            }
        }
    }

    fn existing(&self, guild_id: GuildId, missing: PlaybackError) -> PlaybackResult<SessionHandle> {
        self.store.get(guild_id).ok_or(missing)
    }
}
