//! Seams to the voice side of Discord.
//!
//! [`VoiceTransport`] joins and leaves voice channels, [`AudioOutput`] drives
//! the single stream slot each guild has. Both are implemented by
//! [`super::voice::SongbirdBackend`] in production.

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::fmt;

/// Identifica cada arranque de stream dentro de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Conexión de voz activa de una guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<ConnectionHandle>;

    async fn disconnect(&self, connection: &ConnectionHandle) -> Result<()>;

    /// Whether the voice gateway session behind the handle is still live.
    async fn is_connected(&self, connection: &ConnectionHandle) -> bool;
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Starts streaming `uri` on the guild's connection. Fails right away on a
    /// malformed URI; later failures arrive as a completion carrying an error.
    async fn start_stream(&self, connection: &ConnectionHandle, stream: StreamId, uri: &str) -> Result<()>;

    /// Ends the guild's stream, if any. Safe to call after it already ended.
    async fn stop(&self, guild_id: GuildId);

    async fn pause(&self, guild_id: GuildId) -> Result<()>;

    async fn resume(&self, guild_id: GuildId) -> Result<()>;
}
