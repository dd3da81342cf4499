//! Errores que llegan hasta quien ejecutó el comando.
//!
//! Los fallos de resolución y de arranque de stream se recuperan dentro del
//! núcleo (se saltan y se cuentan), así que no tienen variante aquí.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("You need to be in a voice channel!")]
    NoVoicePresence,

    #[error("Nothing is playing!")]
    NothingPlaying,

    #[error("Nothing is paused!")]
    NothingPaused,

    #[error("I'm not in a voice channel!")]
    NotConnected,

    #[error("Voice connection failed: {0}")]
    Transport(String),

    /// El worker de la sesión ya terminó (leave o reaper en curso)
    #[error("The session for this server was just closed, try again")]
    SessionClosed,
}

impl PlaybackError {
    /// Fallos de precondición: el estado no cambia y se informa tal cual.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoVoicePresence | Self::NothingPlaying | Self::NothingPaused | Self::NotConnected
        )
    }
}

pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;
