use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SPOTIFY_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?(track|playlist|album)/([A-Za-z0-9]+)",
    )
    .expect("valid spotify link regex")
});

static SPOTIFY_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spotify:(track|playlist|album):([A-Za-z0-9]+)$").expect("valid spotify uri regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Track,
    Playlist,
    Album,
}

impl MetadataKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(Self::Track),
            "playlist" => Some(Self::Playlist),
            "album" => Some(Self::Album),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Playlist => "playlist",
            Self::Album => "album",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLink {
    pub kind: MetadataKind,
    pub id: String,
}

impl MetadataLink {
    pub fn parse(input: &str) -> Option<Self> {
        let caps = SPOTIFY_LINK
            .captures(input)
            .or_else(|| SPOTIFY_URI.captures(input))?;

        Some(Self {
            kind: MetadataKind::from_segment(&caps[1])?,
            id: caps[2].to_string(),
        })
    }
}

/// Clasificación de la entrada de `/play`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Link de Spotify ya desglosado
    Metadata(MetadataLink),
    /// Link de Spotify que no sabemos interpretar
    UnsupportedMetadata(String),
    /// Playlist de YouTube u otra colección de links
    LinkCollection(String),
    Direct(String),
    Query(String),
}

impl InputKind {
    pub fn classify(input: &str) -> Self {
        let input = input.trim();

        if is_spotify(input) {
            return match MetadataLink::parse(input) {
                Some(link) => Self::Metadata(link),
                None => Self::UnsupportedMetadata(input.to_string()),
            };
        }

        match parse_http_url(input) {
            Some(url) if url.query().is_some_and(|q| q.contains("list=")) => {
                Self::LinkCollection(input.to_string())
            }
            Some(_) => Self::Direct(input.to_string()),
            None => Self::Query(input.to_string()),
        }
    }

    /// Target passed to the extraction service for the single-item path.
    pub fn extraction_target(&self) -> Option<String> {
        match self {
            Self::Direct(url) => Some(url.clone()),
            Self::Query(text) => Some(search_target(text)),
            _ => None,
        }
    }
}

/// `ytsearch1:` prefix asks yt-dlp for the single best result.
pub fn search_target(query: &str) -> String {
    format!("ytsearch1:{}", query)
}

fn is_spotify(input: &str) -> bool {
    input.starts_with("spotify:") || input.contains("spotify.com")
}

fn parse_http_url(input: &str) -> Option<Url> {
    let url = Url::parse(input).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    (matches!(url.scheme(), "http" | "https") && has_host).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spotify_links_are_classified_by_kind() {
        assert_eq!(
            InputKind::classify("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            InputKind::Metadata(MetadataLink {
                kind: MetadataKind::Track,
                id: "4uLU6hMCjMI75M1A2tKUQC".into(),
            })
        );
        assert_eq!(
            InputKind::classify("https://open.spotify.com/intl-es/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            InputKind::Metadata(MetadataLink {
                kind: MetadataKind::Playlist,
                id: "37i9dQZF1DXcBWIGoYBM5M".into(),
            })
        );
        assert_eq!(
            InputKind::classify("spotify:album:1DFixLWuPkv3KT3TnV35m3"),
            InputKind::Metadata(MetadataLink {
                kind: MetadataKind::Album,
                id: "1DFixLWuPkv3KT3TnV35m3".into(),
            })
        );
    }

    #[test]
    fn unknown_spotify_links_are_flagged() {
        assert_eq!(
            InputKind::classify("https://open.spotify.com/artist/0OdUWJ0sBjDrqHygGUXeCF"),
            InputKind::UnsupportedMetadata(
                "https://open.spotify.com/artist/0OdUWJ0sBjDrqHygGUXeCF".into()
            )
        );
    }

    #[test]
    fn list_parameter_marks_a_collection() {
        let url = "https://www.youtube.com/watch?v=abc&list=PL123";
        assert_eq!(InputKind::classify(url), InputKind::LinkCollection(url.into()));
    }

    #[test]
    fn plain_links_and_text() {
        assert_eq!(
            InputKind::classify("https://youtu.be/dQw4w9WgXcQ"),
            InputKind::Direct("https://youtu.be/dQw4w9WgXcQ".into())
        );
        assert_eq!(
            InputKind::classify("  never gonna give you up "),
            InputKind::Query("never gonna give you up".into())
        );
        // sin esquema http no es link
        assert_eq!(
            InputKind::classify("ftp://files.example.com/song.mp3"),
            InputKind::Query("ftp://files.example.com/song.mp3".into())
        );
    }

    #[test]
    fn extraction_target_prefixes_queries() {
        assert_eq!(
            InputKind::Query("lofi beats".into()).extraction_target(),
            Some("ytsearch1:lofi beats".to_string())
        );
        assert_eq!(
            InputKind::Direct("https://youtu.be/x".into()).extraction_target(),
            Some("https://youtu.be/x".to_string())
        );
        assert_eq!(InputKind::LinkCollection("https://y/?list=1".into()).extraction_target(), None);
    }
}
