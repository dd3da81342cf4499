//! Session Store.
//!
//! One [`Session`] per guild, each owned by its own worker task. Everything
//! else talks to a session through a cloneable [`SessionHandle`], so commands
//! for one guild run one after another while different guilds run in
//! parallel. The map itself is a [`DashMap`], shared by the command handlers,
//! the reaper and the completion dispatcher.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, info};

use super::{
    output::{AudioOutput, StreamId, VoiceTransport},
    session::{Session, SessionStatus},
};
use crate::{
    error::{PlaybackError, PlaybackResult},
    sources::Track,
};

enum SessionCommand {
    EnsureConnected {
        channel_id: ChannelId,
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Enqueue {
        tracks: Vec<Track>,
        reply: oneshot::Sender<bool>,
    },
    Pause {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Resume {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Skip {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Leave {
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    ReapIfIdle {
        now: Instant,
        threshold: Duration,
        reply: oneshot::Sender<bool>,
    },
    StreamEnded {
        stream: StreamId,
        error: Option<String>,
    },
    ConnectionLost,
}

/// Cloneable address of one session worker.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// The worker exited after `leave` or a reap.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: SessionCommand) -> PlaybackResult<()> {
        self.tx.send(command).map_err(|_| PlaybackError::SessionClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> PlaybackResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)
    }

    pub async fn ensure_connected(&self, channel_id: ChannelId) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::EnsureConnected { channel_id, reply })
            .await?
    }

    /// Returns whether playback started because of this enqueue.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> PlaybackResult<bool> {
        self.request(|reply| SessionCommand::Enqueue { tracks, reply }).await
    }

    pub async fn pause(&self) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::Pause { reply }).await?
    }

    pub async fn resume(&self) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::Resume { reply }).await?
    }

    pub async fn skip(&self) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::Skip { reply }).await?
    }

    pub async fn stop(&self) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    pub async fn toggle_loop(&self) -> PlaybackResult<bool> {
        self.request(|reply| SessionCommand::ToggleLoop { reply }).await
    }

    pub async fn status(&self) -> PlaybackResult<SessionStatus> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Stop, disconnect and end the worker. Fails with `NotConnected` (and
    /// changes nothing) when the session holds no connection.
    pub async fn leave(&self) -> PlaybackResult<()> {
        self.request(|reply| SessionCommand::Leave { reply }).await?
    }

    /// Shuts the session down if it has been idle for at least `threshold`.
    pub async fn reap_if_idle(&self, now: Instant, threshold: Duration) -> PlaybackResult<bool> {
        self.request(|reply| SessionCommand::ReapIfIdle {
            now,
            threshold,
            reply,
        })
        .await
    }

    pub fn stream_ended(&self, stream: StreamId, error: Option<String>) -> PlaybackResult<()> {
        self.send(SessionCommand::StreamEnded { stream, error })
    }

    pub fn connection_lost(&self) -> PlaybackResult<()> {
        self.send(SessionCommand::ConnectionLost)
    }
}

/// Owns the session and applies commands in arrival order. Returns once the
/// session has been torn down or every handle is gone.
async fn run_session(
    mut session: Session,
    transport: Arc<dyn VoiceTransport>,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
) {
    let guild_id = session.guild_id();
    debug!("🧵 Worker de sesión iniciado para guild {}", guild_id);

    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::EnsureConnected { channel_id, reply } => {
                let _ = reply.send(session.ensure_connected(transport.as_ref(), channel_id).await);
            }
            SessionCommand::Enqueue { tracks, reply } => {
                let _ = reply.send(session.enqueue(tracks).await);
            }
            SessionCommand::Pause { reply } => {
                let _ = reply.send(session.pause().await);
            }
            SessionCommand::Resume { reply } => {
                let _ = reply.send(session.resume().await);
            }
            SessionCommand::Skip { reply } => {
                let _ = reply.send(session.skip().await);
            }
            SessionCommand::Stop { reply } => {
                session.stop().await;
                let _ = reply.send(());
            }
            SessionCommand::ToggleLoop { reply } => {
                let _ = reply.send(session.toggle_loop());
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(session.status());
            }
            SessionCommand::Leave { reply } => {
                if session.connection().is_none() {
                    let _ = reply.send(Err(PlaybackError::NotConnected));
                    continue;
                }
                session.shutdown(transport.as_ref()).await;
                let _ = reply.send(Ok(()));
                break;
            }
            SessionCommand::ReapIfIdle {
                now,
                threshold,
                reply,
            } => {
                if !session.is_reapable(now, threshold) {
                    let _ = reply.send(false);
                    continue;
                }
                info!("🧹 Sesión inactiva en guild {}, liberando", guild_id);
                session.shutdown(transport.as_ref()).await;
                let _ = reply.send(true);
                break;
            }
            SessionCommand::StreamEnded { stream, error } => {
                session.on_stream_ended(stream, error).await;
            }
            SessionCommand::ConnectionLost => {
                info!("🔌 Bot desconectado de voz en guild {}", guild_id);
                session.connection_lost().await;
            }
        }
    }

    debug!("🧵 Worker de sesión terminado para guild {}", guild_id);
}

pub struct SessionStore {
    sessions: DashMap<GuildId, SessionHandle>,
    output: Arc<dyn AudioOutput>,
    transport: Arc<dyn VoiceTransport>,
    next_generation: AtomicU64,
    stream_ids: Arc<AtomicU64>,
}

impl SessionStore {
    pub fn new(output: Arc<dyn AudioOutput>, transport: Arc<dyn VoiceTransport>) -> Self {
        Self {
            sessions: DashMap::new(),
            output,
            transport,
            next_generation: AtomicU64::new(0),
            stream_ids: Arc::default(),
        }
    }

    /// Never connects anything; a fresh session starts Idle and disconnected.
    /// A handle whose worker already exited is replaced.
    pub fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        let mut entry = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| self.spawn(guild_id));

        if entry.is_closed() {
            *entry = self.spawn(guild_id);
        }

        entry.value().clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Removes `handle`'s session, unless the slot already holds a newer one.
    pub fn remove(&self, handle: &SessionHandle) -> bool {
        self.sessions
            .remove_if(&handle.guild_id, |_, current| current.generation == handle.generation)
            .is_some()
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn spawn(&self, guild_id: GuildId) -> SessionHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(guild_id, self.output.clone(), self.stream_ids.clone());

        tokio::spawn(run_session(session, self.transport.clone(), rx));
        debug!("🆕 Sesión creada para guild {} (gen {})", guild_id, generation);

        SessionHandle {
            guild_id,
            generation,
            tx,
        }
    }
}
