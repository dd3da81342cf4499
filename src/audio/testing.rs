//! Fakes shared by the audio tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc};

use super::{
    handoff::{Completion, CompletionSender},
    output::{AudioOutput, ConnectionHandle, MockVoiceTransport, StreamId},
};
use crate::sources::Track;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Started(StreamId, String),
    Stopped,
    Paused,
    Resumed,
}

/// Salida de audio que graba lo que se le pide. Rechaza URIs `bad:`.
#[derive(Default)]
pub struct FakeOutput {
    events: Mutex<Vec<OutputEvent>>,
    active: Mutex<HashMap<GuildId, StreamId>>,
    completions: Option<CompletionSender>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stopping or finishing a stream reports a completion, like songbird does.
    pub fn with_completions(completions: CompletionSender) -> Arc<Self> {
        Arc::new(Self {
            completions: Some(completions),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().clone()
    }

    pub fn started_uris(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Started(_, uri) => Some(uri.clone()),
                _ => None,
            })
            .collect()
    }

    /// Natural end of the guild's stream.
    pub fn finish(&self, guild_id: GuildId, error: Option<&str>) {
        if let Some(stream) = self.active.lock().remove(&guild_id) {
            self.complete(guild_id, stream, error.map(str::to_string));
        }
    }

    fn complete(&self, guild_id: GuildId, stream: StreamId, error: Option<String>) {
        if let Some(completions) = &self.completions {
            completions.notify(Completion {
                guild_id,
                stream,
                error,
            });
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn start_stream(&self, connection: &ConnectionHandle, stream: StreamId, uri: &str) -> Result<()> {
        if uri.starts_with("bad:") {
            anyhow::bail!("malformed stream uri: {}", uri);
        }
        self.events.lock().push(OutputEvent::Started(stream, uri.to_string()));
        self.active.lock().insert(connection.guild_id, stream);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        self.events.lock().push(OutputEvent::Stopped);
        let ended = self.active.lock().remove(&guild_id);
        if let Some(stream) = ended {
            self.complete(guild_id, stream, None);
        }
    }

    async fn pause(&self, _guild_id: GuildId) -> Result<()> {
        self.events.lock().push(OutputEvent::Paused);
        Ok(())
    }

    async fn resume(&self, _guild_id: GuildId) -> Result<()> {
        self.events.lock().push(OutputEvent::Resumed);
        Ok(())
    }
}

pub fn guild() -> GuildId {
    GuildId::new(4242)
}

pub fn channel() -> ChannelId {
    ChannelId::new(77)
}

pub fn connection() -> ConnectionHandle {
    ConnectionHandle {
        guild_id: guild(),
        channel_id: channel(),
    }
}

/// Transporte que siempre conecta y nunca pierde la conexión.
pub fn connected_transport() -> MockVoiceTransport {
    let mut transport = MockVoiceTransport::new();
    transport.expect_connect().returning(|guild_id, channel_id| {
        Ok(ConnectionHandle {
            guild_id,
            channel_id,
        })
    });
    transport.expect_is_connected().returning(|_| true);
    transport.expect_disconnect().returning(|_| Ok(()));
    transport
}

pub fn track(name: &str) -> Track {
    Track::new(
        format!("https://cdn.example/{}", name),
        name,
        format!("https://www.youtube.com/watch?v={}", name),
    )
    .expect("test track has a stream uri")
}

pub fn bad_track(name: &str) -> Track {
    Track::new(format!("bad:{}", name), name, format!("https://www.youtube.com/watch?v={}", name))
        .expect("test track has a stream uri")
}

pub fn titles<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Vec<String> {
    tracks.into_iter().map(|t| t.title().to_string()).collect()
}
