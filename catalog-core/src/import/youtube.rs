use async_trait::async_trait;
use catalog_model::{AssetDraft, AssetType, EpisodeDraft, EpisodeID, SeriesID};

use super::{ImportedEpisode, Importer};
use crate::error::{CatalogError, Result};

const IMPORTED_TITLE: &str = "YouTube Import";
const VIDEO_MIME: &str = "video/mp4";

/// Placeholder YouTube importer: no remote metadata is fetched, the source
/// URL becomes the video asset as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct YouTubeImporter;

impl YouTubeImporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Importer for YouTubeImporter {
    async fn fetch_episode(&self, source_url: &str, series_id: &str) -> Result<ImportedEpisode> {
        let series_id = SeriesID::parse_str(series_id)
            .map_err(|err| CatalogError::InvalidInput(format!("invalid series ID: {err}")))?;

        let draft_id = EpisodeID::new();
        Ok(ImportedEpisode {
            draft_id,
            episode: EpisodeDraft::new(series_id, IMPORTED_TITLE),
            asset: Some(AssetDraft {
                episode_id: draft_id,
                asset_type: AssetType::Video,
                mime_type: VIDEO_MIME.into(),
                size_bytes: None,
                url: Some(source_url.to_string()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_video_asset_pointing_at_source() {
        let series_id = SeriesID::new();
        let url = "https://youtube.com/watch?v=test&param=value#fragment";

        let imported = YouTubeImporter::new()
            .fetch_episode(url, &series_id.to_string())
            .await
            .unwrap();

        assert_eq!(imported.episode.title, "YouTube Import");
        assert_eq!(imported.episode.series_id, series_id);
        let asset = imported.asset.unwrap();
        assert_eq!(asset.episode_id, imported.draft_id);
        assert_eq!(asset.asset_type, AssetType::Video);
        assert_eq!(asset.mime_type, "video/mp4");
        assert_eq!(asset.url.as_deref(), Some(url));
    }

    #[tokio::test]
    async fn empty_url_is_accepted_but_series_id_is_not() {
        let importer = YouTubeImporter::new();
        assert!(importer
            .fetch_episode("", &SeriesID::new().to_string())
            .await
            .is_ok());

        for bad in ["invalid-uuid", ""] {
            let err = importer
                .fetch_episode("https://youtube.com/watch?v=x", bad)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("invalid series ID"));
            assert!(!err.is_retryable());
        }
    }
}
