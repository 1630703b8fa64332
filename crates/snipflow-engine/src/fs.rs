//! Filesystem-backed content store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::EngineError;
use crate::store::ContentStore;

/// Stores each snippet source at `<root>/<container>/<key>`.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a location, rejecting anything that would leave the root.
    fn resolve(&self, container: &str, key: &str) -> Result<PathBuf, EngineError> {
        let mut path = self.root.clone();
        for part in [container, key] {
            let relative = Path::new(part);
            if part.is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(EngineError::InvalidKey(format!("{container}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn get(&self, container: &str, key: &str) -> Result<String, EngineError> {
        let path = self.resolve(container, key)?;
        debug!(path = %path.display(), "Reading snippet content");
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), EngineError> {
        let path = self.resolve(container, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), bytes = content.len(), "Writing snippet content");
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
