//! Local feed lists.

use crate::error::RegistryResult;
use crate::rdd::parse_feeds;
use feedmon_core::FeedConfig;
use feedmon_source::{BoxFuture, Source, SourceResult};
use std::path::{Path, PathBuf};

/// Feed list read from a JSON file in directory format.
///
/// The file is re-read on every fetch so edits are picked up without a
/// restart.
#[derive(Debug, Clone)]
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> RegistryResult<Vec<FeedConfig>> {
        let body = tokio::fs::read(&self.path).await?;
        parse_feeds(&body)
    }
}

impl Source for FileFeedSource {
    type Output = Vec<FeedConfig>;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<Vec<FeedConfig>>> {
        Box::pin(async move { Ok(self.load().await?) })
    }
}

/// Fixed feed list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticFeedSource {
    feeds: Vec<FeedConfig>,
}

impl StaticFeedSource {
    pub fn new(feeds: Vec<FeedConfig>) -> Self {
        Self { feeds }
    }
}

impl Source for StaticFeedSource {
    type Output = Vec<FeedConfig>;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<Vec<FeedConfig>>> {
        let feeds = self.feeds.clone();
        Box::pin(async move { Ok(feeds) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::rdd::tests::entry_json;
    use feedmon_core::PublicKey;

    fn write_feeds(file: &tempfile::NamedTempFile, entries: serde_json::Value) {
        std::fs::write(file.path(), entries.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_file_source_rereads_on_each_fetch() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_feeds(&file, serde_json::json!([entry_json("SOL / USD", "live", 10)]));
        let source = FileFeedSource::new(file.path());

        let first = source.fetch().await.unwrap();
        assert_eq!(first.len(), 1);

        write_feeds(
            &file,
            serde_json::json!([
                entry_json("SOL / USD", "live", 10),
                entry_json("ETH / USD", "live", 20),
            ]),
        );
        let second = source.fetch().await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].state_account, PublicKey::new([21; 32]));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileFeedSource::new(dir.path().join("feeds.json"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
        assert!(source.fetch().await.is_err());
    }

    #[test]
    fn test_static_source_serves_fixed_list() {
        let feeds = crate::rdd::parse_feeds(
            serde_json::json!([entry_json("SOL / USD", "live", 10)]).to_string().as_bytes(),
        )
        .unwrap();
        let source = StaticFeedSource::new(feeds.clone());
        assert_eq!(tokio_test::block_on(source.fetch()).unwrap(), feeds);
        assert_eq!(tokio_test::block_on(source.fetch()).unwrap(), feeds);
    }
}
