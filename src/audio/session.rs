//! Playback state machine for one guild.
//!
//! A [`Session`] owns the queue, the loop flag and the connection handle. It
//! is only ever touched by its worker task (see [`super::store`]), so none of
//! the methods here lock anything.

use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::output::{AudioOutput, ConnectionHandle, StreamId, VoiceTransport};
use crate::{
    error::{PlaybackError, PlaybackResult},
    sources::Track,
};

/// Cantidad de canciones mostradas en `/queue`
pub const UPCOMING_PREVIEW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone)]
struct NowPlaying {
    track: Track,
    stream: StreamId,
}

/// `current` vive dentro del estado: hay track si y solo si Playing/Paused.
#[derive(Debug, Clone, Default)]
enum Playback {
    #[default]
    Idle,
    Playing(NowPlaying),
    Paused(NowPlaying),
}

impl Playback {
    fn now_playing(&self) -> Option<&NowPlaying> {
        match self {
            Self::Idle => None,
            Self::Playing(np) | Self::Paused(np) => Some(np),
        }
    }

    fn kind(&self) -> PlayerState {
        match self {
            Self::Idle => PlayerState::Idle,
            Self::Playing(_) => PlayerState::Playing,
            Self::Paused(_) => PlayerState::Paused,
        }
    }
}

/// Snapshot for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: PlayerState,
    pub now_playing: Option<Track>,
    pub upcoming: Vec<Track>,
    pub upcoming_total: usize,
    pub loop_enabled: bool,
    pub connected: bool,
}

impl SessionStatus {
    pub fn empty() -> Self {
        Self {
            state: PlayerState::Idle,
            now_playing: None,
            upcoming: Vec::new(),
            upcoming_total: 0,
            loop_enabled: false,
            connected: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.now_playing.is_none() && self.upcoming_total == 0
    }
}

pub struct Session {
    guild_id: GuildId,
    queue: VecDeque<Track>,
    playback: Playback,
    loop_enabled: bool,
    last_activity: Instant,
    connection: Option<ConnectionHandle>,
    stream_ids: Arc<AtomicU64>,
    output: Arc<dyn AudioOutput>,
}

impl Session {
    /// `stream_ids` is shared by every session of the process, so a stream id
    /// is never reused, not even by a later session of the same guild.
    pub fn new(guild_id: GuildId, output: Arc<dyn AudioOutput>, stream_ids: Arc<AtomicU64>) -> Self {
        Self {
            guild_id,
            queue: VecDeque::new(),
            playback: Playback::Idle,
            loop_enabled: false,
            last_activity: Instant::now(),
            connection: None,
            stream_ids,
            output,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlayerState {
        self.playback.kind()
    }

    pub fn current(&self) -> Option<&Track> {
        self.playback.now_playing().map(|np| &np.track)
    }

    pub fn current_stream(&self) -> Option<StreamId> {
        self.playback.now_playing().map(|np| np.stream)
    }

    pub fn queue(&self) -> impl Iterator<Item = &Track> {
        self.queue.iter()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: ConnectionHandle) {
        self.connection = Some(connection);
    }

    /// Conecta si no hay conexión o si la que había ya no está viva.
    pub async fn ensure_connected(
        &mut self,
        transport: &dyn VoiceTransport,
        channel_id: ChannelId,
    ) -> PlaybackResult<()> {
        self.touch();
        if let Some(connection) = self.connection {
            if transport.is_connected(&connection).await {
                return Ok(());
            }
            warn!("🔌 Conexión de voz perdida en guild {}, reconectando", self.guild_id);
        }

        match transport.connect(self.guild_id, channel_id).await {
            Ok(connection) => {
                info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, self.guild_id);
                self.connection = Some(connection);
                Ok(())
            }
            Err(e) => {
                warn!("❌ Error al conectar en guild {}: {:#}", self.guild_id, e);
                Err(PlaybackError::Transport(e.to_string()))
            }
        }
    }

    /// Appends to the tail; starts playback when idle and connected.
    /// Returns whether a new stream was started.
    pub async fn enqueue(&mut self, tracks: Vec<Track>) -> bool {
        if tracks.is_empty() {
            return false;
        }

        for track in tracks {
            debug!("➕ Agregado a la cola: {}", track.title());
            self.queue.push_back(track);
        }
        self.touch();

        if self.state() == PlayerState::Idle && self.connection.is_some() {
            return self.advance().await;
        }
        false
    }

    /// Moves to the next track. With loop on, the finished track goes back to
    /// the front first. Rejected streams are skipped; every attempt consumes a
    /// queued track, so a queue full of bad streams drains to Idle.
    pub async fn advance(&mut self) -> bool {
        let finished = std::mem::take(&mut self.playback);
        if self.loop_enabled {
            if let Some(np) = finished.now_playing() {
                info!("🔁 Repitiendo: {}", np.track.title());
                self.queue.push_front(np.track.clone());
            }
        }

        let Some(connection) = self.connection else {
            debug!("Sin conexión de voz en guild {}, la cola espera", self.guild_id);
            return false;
        };

        while let Some(track) = self.queue.pop_front() {
            let stream = self.next_stream_id();
            self.touch();

            match self.output.start_stream(&connection, stream, track.stream_uri()).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo: {} ({}) en guild {}", track.title(), stream, self.guild_id);
                    self.playback = Playback::Playing(NowPlaying { track, stream });
                    return true;
                }
                Err(e) => {
                    warn!(
                        "❌ Stream rechazado para {} en guild {}: {:#}; probando el siguiente",
                        track.title(),
                        self.guild_id,
                        e
                    );
                }
            }
        }

        debug!("📭 Cola vacía en guild {}", self.guild_id);
        false
    }

    /// Completion of `stream`. Completions for anything but the outstanding
    /// stream are stale and ignored.
    pub async fn on_stream_ended(&mut self, stream: StreamId, error: Option<String>) -> bool {
        if self.current_stream() != Some(stream) {
            debug!("Ignorando fin de stream viejo {} en guild {}", stream, self.guild_id);
            return false;
        }

        if let Some(error) = error {
            warn!("⚠️ Error de reproducción en guild {}: {}", self.guild_id, error);
        }

        self.advance().await;
        true
    }

    pub async fn pause(&mut self) -> PlaybackResult<()> {
        let Playback::Playing(np) = &self.playback else {
            return Err(PlaybackError::NothingPlaying);
        };
        let np = np.clone();

        if let Err(e) = self.output.pause(self.guild_id).await {
            warn!("⚠️ No se pudo pausar en guild {}: {:#}", self.guild_id, e);
        }
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        self.playback = Playback::Paused(np);
        Ok(())
    }

    pub async fn resume(&mut self) -> PlaybackResult<()> {
        let Playback::Paused(np) = &self.playback else {
            return Err(PlaybackError::NothingPaused);
        };
        let np = np.clone();

        if let Err(e) = self.output.resume(self.guild_id).await {
            warn!("⚠️ No se pudo reanudar en guild {}: {:#}", self.guild_id, e);
        }
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        self.playback = Playback::Playing(np);
        Ok(())
    }

    /// Ends the current stream; the completion that follows does the advance.
    pub async fn skip(&mut self) -> PlaybackResult<()> {
        if self.state() == PlayerState::Idle {
            return Err(PlaybackError::NothingPlaying);
        }

        info!("⏭️ Saltando {} en guild {}", self.current().map(Track::title).unwrap_or("?"), self.guild_id);
        self.output.stop(self.guild_id).await;
        Ok(())
    }

    /// Clears everything but keeps the voice connection.
    pub async fn stop(&mut self) {
        self.queue.clear();
        self.playback = Playback::Idle;
        self.output.stop(self.guild_id).await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        info!(
            "🔁 Loop {} en guild {}",
            if self.loop_enabled { "activado" } else { "desactivado" },
            self.guild_id
        );
        self.loop_enabled
    }

    /// The bot was dropped from voice. The stream ends, the track that was
    /// playing goes back to the front so the next `/play` picks it up.
    pub async fn connection_lost(&mut self) {
        if let Playback::Playing(np) | Playback::Paused(np) = std::mem::take(&mut self.playback) {
            self.queue.push_front(np.track);
        }
        self.output.stop(self.guild_id).await;
        self.connection = None;
    }

    /// `stop()` plus releasing the voice connection.
    pub async fn shutdown(&mut self, transport: &dyn VoiceTransport) {
        self.stop().await;

        if let Some(connection) = self.connection.take() {
            if let Err(e) = transport.disconnect(&connection).await {
                warn!("⚠️ Error al desconectar guild {}: {:#}", self.guild_id, e);
            }
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }

    pub fn is_reapable(&self, now: Instant, threshold: Duration) -> bool {
        self.state() == PlayerState::Idle && now.saturating_duration_since(self.last_activity) >= threshold
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            now_playing: self.current().cloned(),
            upcoming: self.queue.iter().take(UPCOMING_PREVIEW).cloned().collect(),
            upcoming_total: self.queue.len(),
            loop_enabled: self.loop_enabled,
            connected: self.connection.is_some(),
        }
    }

    fn next_stream_id(&mut self) -> StreamId {
        StreamId(self.stream_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
