//! Object storage for uploaded episode media.

mod s3;
mod sigv4;

pub use s3::S3Storage;
pub use sigv4::SigV4Presigner;

use async_trait::async_trait;
use catalog_model::{EpisodeID, SeriesID};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::Result;

/// Bucket-backed blob store that hands out upload URLs instead of
/// proxying bytes.
#[async_trait]
pub trait ObjectStorage: Send + Sync + fmt::Debug {
    /// Creates the configured bucket when it does not exist yet.
    async fn ensure_bucket(&self) -> Result<()>;

    /// URL a client can `PUT` the object to until `expiry` elapses.
    async fn presigned_put_url(&self, key: &str, expiry: Duration) -> Result<Url>;

    fn bucket(&self) -> &str;
}

/// Key under which an episode upload is stored:
/// `episodes/{series}/{episode}_{unix_ts}{ext}`.
///
/// `ext` is everything from the last `.` of the final path component of
/// `filename`, dot included, or empty when there is none.
pub fn object_key(
    series_id: SeriesID,
    episode_id: EpisodeID,
    filename: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "episodes/{series_id}/{episode_id}_{}{}",
        at.timestamp(),
        file_extension(filename)
    )
}

fn file_extension(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    name.rfind('.').map_or("", |idx| &name[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_embeds_ids_timestamp_and_extension() {
        let series = SeriesID::new();
        let episode = EpisodeID::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(
            object_key(series, episode, "pilot.final.mp4", at),
            format!("episodes/{series}/{episode}_1709294400.mp4")
        );
        assert_eq!(
            object_key(series, episode, "raw", at),
            format!("episodes/{series}/{episode}_1709294400")
        );
    }

    #[test]
    fn extension_only_looks_at_the_last_component() {
        assert_eq!(file_extension("dir.v2/clip"), "");
        assert_eq!(file_extension("dir/clip.MOV"), ".MOV");
        assert_eq!(file_extension(".hidden"), ".hidden");
    }
}
