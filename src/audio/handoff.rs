//! Completion Handoff.
//!
//! Songbird reports the end of a stream from its own event context. That
//! callback only drops a [`Completion`] in a channel; the dispatcher waits the
//! fixed advance delay and then hands the completion to the guild's session
//! worker, which is the only place allowed to advance the queue.

use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{output::StreamId, store::SessionStore};

/// A stream finished, naturally or with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub guild_id: GuildId,
    pub stream: StreamId,
    pub error: Option<String>,
}

/// Cheap to clone; handed to whatever produces completions.
#[derive(Clone)]
pub struct CompletionSender {
    tx: mpsc::UnboundedSender<Completion>,
}

impl CompletionSender {
    /// Never blocks, so it is safe to call from the audio event context.
    pub fn notify(&self, completion: Completion) {
        if let Err(e) = self.tx.send(completion) {
            debug!("Dispatcher cerrado, descartando fin de stream {}", e.0.stream);
        }
    }
}

pub fn channel() -> (CompletionSender, mpsc::UnboundedReceiver<Completion>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CompletionSender { tx }, rx)
}

pub struct CompletionHandoff {
    rx: mpsc::UnboundedReceiver<Completion>,
    store: Arc<SessionStore>,
    delay: Duration,
}

impl CompletionHandoff {
    pub fn new(rx: mpsc::UnboundedReceiver<Completion>, store: Arc<SessionStore>, delay: Duration) -> Self {
        Self { rx, store, delay }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("🎚️ Dispatcher de fin de stream iniciado (delay {:?})", self.delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                completion = self.rx.recv() => match completion {
                    Some(completion) => self.dispatch(completion, shutdown.clone()),
                    None => break,
                },
            }
        }

        info!("🛑 Dispatcher de fin de stream detenido");
    }

    /// Each completion waits on its own task so one guild's delay never holds
    /// back another's.
    fn dispatch(&self, completion: Completion, shutdown: CancellationToken) {
        let store = self.store.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let Completion {
                guild_id,
                stream,
                error,
            } = completion;

            let Some(handle) = store.get(guild_id) else {
                debug!("Fin de stream {} para guild {} sin sesión", stream, guild_id);
                return;
            };

            if handle.stream_ended(stream, error).is_err() {
                debug!("Sesión de guild {} ya cerrada, ignorando fin de {}", guild_id, stream);
            }
        });
    }
}
