//! File-backed code store
//!
//! Each submission gets its own directory, `<root>/<uuid>/main.<ext>`, which
//! also serves as the working directory for compiling and running it.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::FileExtension;
use crate::store::{CodeStore, StoreError};

#[derive(Debug, Clone)]
pub struct FsCodeStore {
    root: PathBuf,
}

impl FsCodeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CodeStore for FsCodeStore {
    #[instrument(skip(self, code), fields(root = %self.root.display(), bytes = code.len()))]
    async fn save_code(
        &self,
        code: &[u8],
        extension: &FileExtension,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;

        // Absolute, so the path stays valid from any child's working directory.
        let dir = tokio::fs::canonicalize(&dir).await?;
        let path = dir.join(format!("main.{extension}"));
        tokio::fs::write(&path, code).await?;

        debug!(path = %path.display(), "saved code");
        Ok(path)
    }
}
