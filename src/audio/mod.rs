//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`session`] - Playback State Machine
//! - Queue, loop flag, current track and connection of one guild
//! - Idle / Playing / Paused transitions and bounded advance
//!
//! ### [`store`] - Session Store
//! - One worker task per guild; commands for a guild are applied in order
//! - Get-or-create on demand, removal on `/leave` or reap
//!
//! ### [`handoff`] - Completion Handoff
//! - Moves "stream ended" out of the audio callback and into the session
//!   worker after a short fixed delay
//!
//! ### [`reaper`] - Idle Reaper
//! - Periodic sweep that disconnects guilds idle for too long
//!
//! ### [`voice`] - Songbird backend
//! - Implements the [`output`] traits on top of songbird
//!
//! [`player::AudioPlayer`] is what the slash commands talk to.

pub mod handoff;
pub mod output;
pub mod player;
pub mod reaper;
pub mod session;
pub mod store;
pub mod voice;

#[cfg(test)]
mod testing;
