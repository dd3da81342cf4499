//! Track Resolver: one user input in, zero or more [`Track`]s out.
//!
//! Resolution never fails from the caller's point of view. Every service error
//! is logged and turned into "no track produced", and batch members that fail
//! are skipped so the rest of the batch still lands in the queue.

use futures::{stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    ExtractionService, InputKind, MetadataItem, MetadataKind, MetadataLink,
    MetadataService, Track,
};

/// Outcome of one `/play` resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub tracks: Vec<Track>,
    /// Items the resolver tried to turn into tracks (1 for single inputs).
    pub attempted: usize,
    /// Playlist/album name when the input was a collection.
    pub collection: Option<String>,
}

impl Resolution {
    fn single(track: Option<Track>) -> Self {
        Self {
            tracks: track.into_iter().collect(),
            attempted: 1,
            collection: None,
        }
    }

    fn empty() -> Self {
        Self::default()
    }

    pub fn added(&self) -> usize {
        self.tracks.len()
    }

    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.tracks.len())
    }
}

#[derive(Clone)]
pub struct TrackResolver {
    extractor: Arc<dyn ExtractionService>,
    metadata: Option<Arc<dyn MetadataService>>,
    concurrency: usize,
}

impl TrackResolver {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        metadata: Option<Arc<dyn MetadataService>>,
        concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            metadata,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn resolve(&self, input: &str) -> Resolution {
        match InputKind::classify(input) {
            InputKind::Metadata(link) => self.resolve_metadata(link).await,
            InputKind::UnsupportedMetadata(raw) => {
                warn!("❌ No se pudo interpretar el link de Spotify: {}", raw);
                Resolution::empty()
            }
            InputKind::LinkCollection(uri) => self.resolve_link_collection(&uri).await,
            kind @ (InputKind::Direct(_) | InputKind::Query(_)) => {
                let Some(target) = kind.extraction_target() else {
                    return Resolution::empty();
                };
                Resolution::single(self.resolve_target(&target, input).await)
            }
        }
    }

    /// Resuelve un link o búsqueda a un Track; cualquier error se registra y da `None`.
    async fn resolve_target(&self, target: &str, fallback_canonical: &str) -> Option<Track> {
        match self.extractor.resolve_one(target).await {
            Ok(Some(media)) => {
                let track = Track::new(
                    media.stream_uri.unwrap_or_default(),
                    media.title.unwrap_or_default(),
                    media.canonical_uri.unwrap_or_else(|| fallback_canonical.to_string()),
                );
                if track.is_none() {
                    warn!("⚠️ yt-dlp no devolvió URL de stream para: {}", target);
                }
                track
            }
            Ok(None) => {
                debug!("📭 Sin resultados para: {}", target);
                None
            }
            Err(e) => {
                warn!("❌ Error obteniendo audio de {}: {:#}", target, e);
                None
            }
        }
    }

    /// Spotify item → búsqueda "artista - título" → link canónico → Track
    async fn resolve_metadata_item(&self, item: &MetadataItem) -> Option<Track> {
        let query = item.search_text();
        let hit = match self.extractor.search_first(&query).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                warn!("⚠️ Sin resultados en YouTube para: {}", query);
                return None;
            }
            Err(e) => {
                warn!("❌ Error buscando {}: {:#}", query, e);
                return None;
            }
        };

        self.resolve_target(&hit.canonical_uri, &hit.canonical_uri).await
    }

    async fn resolve_metadata(&self, link: MetadataLink) -> Resolution {
        let Some(metadata) = self.metadata.as_ref() else {
            warn!("⚠️ Spotify no está configurado, ignorando link {}", link.id);
            return Resolution::empty();
        };

        match link.kind {
            MetadataKind::Track => {
                let item = match metadata.lookup_item(&link.id).await {
                    Ok(item) => item,
                    Err(e) => {
                        warn!("❌ Error consultando track de Spotify {}: {:#}", link.id, e);
                        return Resolution::single(None);
                    }
                };
                Resolution::single(self.resolve_metadata_item(&item).await)
            }
            kind @ (MetadataKind::Playlist | MetadataKind::Album) => {
                let collection = match metadata.lookup_collection(kind, &link.id).await {
                    Ok(collection) => collection,
                    Err(e) => {
                        warn!("❌ Error consultando {} de Spotify {}: {:#}", kind.as_str(), link.id, e);
                        return Resolution::empty();
                    }
                };

                let attempted = collection.items.len();
                let tracks = self
                    .resolve_ordered(collection.items, |this, item| async move {
                        this.resolve_metadata_item(&item).await
                    })
                    .await;

                Resolution {
                    tracks,
                    attempted,
                    collection: Some(collection.name),
                }
            }
        }
    }

    async fn resolve_link_collection(&self, uri: &str) -> Resolution {
        let links = match self.extractor.expand_collection(uri).await {
            Ok(links) => links,
            Err(e) => {
                warn!("❌ Error procesando playlist {}: {:#}", uri, e);
                return Resolution::empty();
            }
        };

        let attempted = links.len();
        let tracks = self
            .resolve_ordered(links, |this, link| async move { this.resolve_target(&link, &link).await })
            .await;

        Resolution {
            tracks,
            attempted,
            collection: None,
        }
    }

    /// Resuelve en paralelo pero conserva el orden original; los fallos se descartan.
    async fn resolve_ordered<T, F, Fut>(&self, items: Vec<T>, resolve: F) -> Vec<Track>
    where
        F: Fn(Self, T) -> Fut,
        Fut: std::future::Future<Output = Option<Track>>,
    {
        let total = items.len();
        let resolved: Vec<Option<Track>> = stream::iter(items)
            .map(|item| resolve(self.clone(), item))
            .buffered(self.concurrency)
            .collect()
            .await;

        let tracks: Vec<Track> = resolved.into_iter().flatten().collect();
        info!("✅ Resueltas {} de {} canciones", tracks.len(), total);
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{
        ExtractedMedia, MetadataCollection, MockExtractionService, MockMetadataService, SearchHit,
    };
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn media(id: &str) -> ExtractedMedia {
        ExtractedMedia {
            stream_uri: Some(format!("https://cdn.example/{}", id)),
            title: Some(format!("Title {}", id)),
            canonical_uri: Some(format!("https://www.youtube.com/watch?v={}", id)),
        }
    }

    fn item(artist: &str, title: &str) -> MetadataItem {
        MetadataItem {
            artist: artist.into(),
            title: title.into(),
        }
    }

    fn resolver(extractor: MockExtractionService, metadata: Option<MockMetadataService>) -> TrackResolver {
        TrackResolver::new(
            Arc::new(extractor),
            metadata.map(|m| Arc::new(m) as Arc<dyn MetadataService>),
            4,
        )
    }

    fn titles(resolution: &Resolution) -> Vec<&str> {
        resolution.tracks.iter().map(Track::title).collect()
    }

    #[tokio::test]
    async fn free_text_is_searched() {
        let mut extractor = MockExtractionService::new();
        extractor
            .expect_resolve_one()
            .with(eq("ytsearch1:song a"))
            .times(1)
            .returning(|_| Ok(Some(media("a"))));

        let resolution = resolver(extractor, None).resolve("song a").await;

        assert_eq!(resolution.attempted, 1);
        assert_eq!(resolution.added(), 1);
        assert_eq!(resolution.tracks[0].canonical_uri(), "https://www.youtube.com/watch?v=a");
    }

    #[tokio::test]
    async fn extraction_error_means_not_found() {
        let mut extractor = MockExtractionService::new();
        extractor
            .expect_resolve_one()
            .returning(|_| Err(anyhow::anyhow!("HTTP Error 403")));

        let resolution = resolver(extractor, None).resolve("https://youtu.be/gone").await;

        assert_eq!(resolution.tracks, vec![]);
        assert_eq!(resolution.attempted, 1);
        assert_eq!(resolution.failed(), 1);
    }

    #[tokio::test]
    async fn media_without_stream_is_not_a_track() {
        let mut extractor = MockExtractionService::new();
        extractor.expect_resolve_one().returning(|_| {
            Ok(Some(ExtractedMedia {
                stream_uri: None,
                title: Some("No stream".into()),
                canonical_uri: None,
            }))
        });

        let resolution = resolver(extractor, None).resolve("https://youtu.be/x").await;
        assert!(resolution.tracks.is_empty());
    }

    #[tokio::test]
    async fn canonical_falls_back_to_input() {
        let mut extractor = MockExtractionService::new();
        extractor.expect_resolve_one().returning(|_| {
            Ok(Some(ExtractedMedia {
                stream_uri: Some("https://cdn/s".into()),
                title: None,
                canonical_uri: None,
            }))
        });

        let resolution = resolver(extractor, None).resolve("https://example.com/a.mp3").await;
        assert_eq!(resolution.tracks[0].canonical_uri(), "https://example.com/a.mp3");
        assert_eq!(resolution.tracks[0].title(), "Unknown");
    }

    #[tokio::test]
    async fn link_collection_skips_failures_and_keeps_order() {
        let mut extractor = MockExtractionService::new();
        extractor.expect_expand_collection().returning(|_| {
            Ok((1..=5).map(|i| format!("https://www.youtube.com/watch?v={}", i)).collect())
        });
        extractor.expect_resolve_one().returning(|link| {
            let id = link.rsplit('=').next().unwrap_or_default().to_string();
            match id.as_str() {
                "2" => Err(anyhow::anyhow!("Video unavailable")),
                "4" => Ok(None),
                _ => Ok(Some(media(&id))),
            }
        });

        let resolution = resolver(extractor, None)
            .resolve("https://www.youtube.com/playlist?list=PL1")
            .await;

        assert_eq!(resolution.attempted, 5);
        assert_eq!(resolution.added(), 3);
        assert_eq!(resolution.failed(), 2);
        assert_eq!(titles(&resolution), vec!["Title 1", "Title 3", "Title 5"]);
    }

    #[tokio::test]
    async fn failed_expansion_is_empty() {
        let mut extractor = MockExtractionService::new();
        extractor
            .expect_expand_collection()
            .returning(|_| Err(anyhow::anyhow!("private playlist")));

        let resolution = resolver(extractor, None)
            .resolve("https://www.youtube.com/playlist?list=PLprivate")
            .await;
        assert_eq!(resolution, Resolution::default());
    }

    #[tokio::test]
    async fn spotify_track_goes_through_search_then_canonical_link() {
        let mut metadata = MockMetadataService::new();
        metadata
            .expect_lookup_item()
            .with(eq("4uLU6hMCjMI75M1A2tKUQC"))
            .returning(|_| Ok(item("Rick Astley", "Never Gonna Give You Up")));

        let mut extractor = MockExtractionService::new();
        extractor
            .expect_search_first()
            .with(eq("Rick Astley - Never Gonna Give You Up"))
            .returning(|_| {
                Ok(Some(SearchHit {
                    canonical_uri: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
                    title: None,
                }))
            });
        extractor
            .expect_resolve_one()
            .with(eq("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .returning(|_| Ok(Some(media("dQw4w9WgXcQ"))));

        let resolution = resolver(extractor, Some(metadata))
            .resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
            .await;

        assert_eq!(resolution.added(), 1);
        assert_eq!(resolution.attempted, 1);
        assert_eq!(resolution.collection, None);
    }

    #[tokio::test]
    async fn spotify_album_reports_n_of_m() {
        let mut metadata = MockMetadataService::new();
        metadata
            .expect_lookup_collection()
            .withf(|kind, id| *kind == MetadataKind::Album && id == "alb")
            .returning(|_, _| {
                Ok(MetadataCollection {
                    name: "Discovery".into(),
                    items: vec![
                        item("Daft Punk", "One More Time"),
                        item("Daft Punk", "Aerodynamic"),
                        item("Daft Punk", "Digital Love"),
                        item("Daft Punk", "Harder Better Faster Stronger"),
                    ],
                })
            });

        let mut extractor = MockExtractionService::new();
        extractor.expect_search_first().returning(|query| {
            if query.ends_with("Aerodynamic") {
                return Ok(None);
            }
            Ok(Some(SearchHit {
                canonical_uri: format!("https://yt/{}", query.replace(' ', "_")),
                title: None,
            }))
        });
        extractor.expect_resolve_one().returning(|link| {
            if link.contains("Digital") {
                return Err(anyhow::anyhow!("Sign in to confirm your age"));
            }
            Ok(Some(ExtractedMedia {
                stream_uri: Some(format!("{}/stream", link)),
                title: Some(link.to_string()),
                canonical_uri: Some(link.to_string()),
            }))
        });

        let resolution = resolver(extractor, Some(metadata))
            .resolve("https://open.spotify.com/album/alb")
            .await;

        assert_eq!(resolution.attempted, 4);
        assert_eq!(resolution.added(), 2);
        assert_eq!(resolution.collection.as_deref(), Some("Discovery"));
        assert_eq!(
            titles(&resolution),
            vec![
                "https://yt/Daft_Punk_-_One_More_Time",
                "https://yt/Daft_Punk_-_Harder_Better_Faster_Stronger",
            ]
        );
    }

    #[tokio::test]
    async fn spotify_without_credentials_resolves_nothing() {
        let extractor = MockExtractionService::new();
        let resolution = resolver(extractor, None)
            .resolve("https://open.spotify.com/playlist/abc")
            .await;
        assert_eq!(resolution, Resolution::default());
    }

    #[tokio::test]
    async fn unsupported_spotify_link_resolves_nothing() {
        let resolution = resolver(MockExtractionService::new(), Some(MockMetadataService::new()))
            .resolve("https://open.spotify.com/show/123")
            .await;
        assert_eq!(resolution, Resolution::default());
    }

    #[tokio::test(start_paused = true)]
    async fn ordering_survives_uneven_latency() {
        struct SlowFirst;

        #[async_trait::async_trait]
        impl ExtractionService for SlowFirst {
            async fn resolve_one(&self, target: &str) -> anyhow::Result<Option<ExtractedMedia>> {
                let id: u64 = target.rsplit('/').next().unwrap_or("0").parse().unwrap_or(0);
                // el primero tarda más que todos los demás
                tokio::time::sleep(std::time::Duration::from_millis(100 / (id + 1))).await;
                Ok(Some(media(&id.to_string())))
            }

            async fn search_first(&self, _query: &str) -> anyhow::Result<Option<SearchHit>> {
                Ok(None)
            }

            async fn expand_collection(&self, _uri: &str) -> anyhow::Result<Vec<String>> {
                Ok((0..6).map(|i| format!("https://yt/{}", i)).collect())
            }
        }

        let resolver = TrackResolver::new(Arc::new(SlowFirst), None, 6);
        let resolution = resolver.resolve("https://yt/playlist?list=x").await;

        assert_eq!(
            titles(&resolution),
            vec!["Title 0", "Title 1", "Title 2", "Title 3", "Title 4", "Title 5"]
        );
    }
}
