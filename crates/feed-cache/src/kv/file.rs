//! Directory-backed key-value store
//!
//! Each key is one file. Writes go to a temporary file that is then renamed
//! over the target, so a crash never leaves a half-written value behind.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::instrument;

use feed_core::{DomainError, KeyValueStore, RepoResult};

/// Key-value store writing one file per key under a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Use `dir`, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> RepoResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(io_error)?;
        Ok(Self { dir })
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

fn io_error(e: std::io::Error) -> DomainError {
    DomainError::CacheError(e.to_string())
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> RepoResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String) -> RepoResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, value).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error)?;
        Ok(())
    }
}
