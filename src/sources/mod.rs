//! # Sources Module
//!
//! Turns whatever a user typed after `/play` into playable [`Track`]s.
//!
//! - [`input`] classifies the raw text (Spotify link, link collection, direct
//!   link, free-text query)
//! - [`ytdlp`] talks to the audio-extraction service
//! - [`spotify`] talks to the music-metadata service
//! - [`resolver`] glues them together with skip-on-failure batches

pub mod input;
pub mod resolver;
pub mod spotify;
pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;

pub use input::{InputKind, MetadataKind, MetadataLink};
pub use resolver::{Resolution, TrackResolver};
pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpClient;

/// Track listo para reproducir. Inmutable una vez creado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    stream_uri: String,
    title: String,
    canonical_uri: String,
}

impl Track {
    /// Only the resolver builds tracks; an empty stream URI yields `None`.
    pub(crate) fn new(
        stream_uri: impl Into<String>,
        title: impl Into<String>,
        canonical_uri: impl Into<String>,
    ) -> Option<Self> {
        let stream_uri = stream_uri.into();
        if stream_uri.trim().is_empty() {
            return None;
        }

        let title = title.into();
        Some(Self {
            stream_uri,
            title: if title.trim().is_empty() { "Unknown".to_string() } else { title },
            canonical_uri: canonical_uri.into(),
        })
    }

    pub fn stream_uri(&self) -> &str {
        &self.stream_uri
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn canonical_uri(&self) -> &str {
        &self.canonical_uri
    }
}

/// Resultado crudo de una extracción de yt-dlp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub stream_uri: Option<String>,
    pub title: Option<String>,
    pub canonical_uri: Option<String>,
}

/// Primer resultado de una búsqueda (sin URL de stream todavía)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub canonical_uri: String,
    pub title: Option<String>,
}

/// Audio-extraction service (yt-dlp in production).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Resolves a link or a `ytsearch1:` query. Nested collections collapse to
    /// their first entry. `Ok(None)` means the service answered with nothing.
    async fn resolve_one(&self, target: &str) -> Result<Option<ExtractedMedia>>;

    /// Single best search result for a natural-language query.
    async fn search_first(&self, query: &str) -> Result<Option<SearchHit>>;

    /// Member links of a playlist-like link, in playlist order.
    async fn expand_collection(&self, uri: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    pub artist: String,
    pub title: String,
}

impl MetadataItem {
    /// Texto de búsqueda "artista - título"
    pub fn search_text(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataCollection {
    pub name: String,
    pub items: Vec<MetadataItem>,
}

/// Music-metadata service (Spotify in production).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn lookup_item(&self, id: &str) -> Result<MetadataItem>;

    async fn lookup_collection(&self, kind: MetadataKind, id: &str) -> Result<MetadataCollection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_requires_stream_uri() {
        assert!(Track::new("", "title", "https://youtu.be/x").is_none());
        assert!(Track::new("   ", "title", "https://youtu.be/x").is_none());

        let track = Track::new("https://cdn/audio", "", "https://youtu.be/x").unwrap();
        assert_eq!(track.title(), "Unknown");
        assert_eq!(track.stream_uri(), "https://cdn/audio");
    }

    #[test]
    fn search_text_joins_artist_and_title() {
        let item = MetadataItem {
            artist: "Daft Punk".into(),
            title: "One More Time".into(),
        };
        assert_eq!(item.search_text(), "Daft Punk - One More Time");

        let untitled = MetadataItem {
            artist: String::new(),
            title: "Intro".into(),
        };
        assert_eq!(untitled.search_text(), "Intro");
    }
}
