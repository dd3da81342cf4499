use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Sesiones
    pub idle_timeout: Duration,
    pub reaper_interval: Duration,
    pub advance_delay: Duration,

    // Resolución
    pub resolve_concurrency: usize,
    pub max_playlist_size: usize,
    pub extraction_timeout: Duration,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),

            // Sesiones
            idle_timeout: duration_var("IDLE_TIMEOUT", "5m")?,
            reaper_interval: duration_var("REAPER_INTERVAL", "1m")?,
            advance_delay: duration_var("ADVANCE_DELAY", "500ms")?,

            // Resolución
            resolve_concurrency: match std::env::var("RESOLVE_CONCURRENCY") {
                Ok(val) if !val.trim().is_empty() => val.trim().parse()?,
                _ => default_concurrency(),
            },
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            extraction_timeout: duration_var("EXTRACTION_TIMEOUT", "30s")?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Every duration must be non-zero
    /// - Resolve concurrency and playlist size must be > 0
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.reaper_interval.is_zero() {
            anyhow::bail!("Reaper interval must be greater than 0");
        }

        if self.advance_delay.is_zero() {
            anyhow::bail!("Advance delay must be greater than 0");
        }

        if self.extraction_timeout.is_zero() {
            anyhow::bail!("Extraction timeout must be greater than 0");
        }

        if self.resolve_concurrency == 0 {
            anyhow::bail!("Resolve concurrency must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes tokens and secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Sessions: idle {}, sweep every {}, advance delay {}\n  \
            Resolver: {} workers, {} max playlist, {} timeout, binary {}\n  \
            Spotify: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.reaper_interval),
            humantime::format_duration(self.advance_delay),
            self.resolve_concurrency,
            self.max_playlist_size,
            humantime::format_duration(self.extraction_timeout),
            self.ytdlp_path,
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
        )
    }
}

/// Default configuration values.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,

            spotify_client_id: None,
            spotify_client_secret: None,

            idle_timeout: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(60),
            advance_delay: Duration::from_millis(500),

            resolve_concurrency: default_concurrency(),
            max_playlist_size: 100,
            extraction_timeout: Duration::from_secs(30),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn duration_var(name: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(raw.trim()).with_context(|| format!("{} is not a valid duration: {}", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.advance_delay, Duration::from_millis(500));
    }

    #[test]
    fn half_configured_spotify_is_rejected() {
        let config = Config {
            spotify_client_id: Some("id".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.spotify_credentials(), None);
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let config = Config {
            idle_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_hides_secrets() {
        let config = Config {
            discord_token: "super-secret-token".into(),
            spotify_client_id: Some("id".into()),
            spotify_client_secret: Some("shh".into()),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret-token"));
        assert!(!summary.contains("shh"));
        assert!(summary.contains("Spotify: enabled"));
    }
}
