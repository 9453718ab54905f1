use async_trait::async_trait;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::package::normalize_path;

/// Where package bytes come from and go to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under `name`; returns the id to load them back with.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<String>;

    async fn size(&self, id: &str) -> Result<u64>;
}

/// Blob store on a local directory. Ids are paths relative to the root and
/// may not leave it.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A store rooted at the directory containing `file`, and the id of
    /// `file` within it.
    pub fn for_file(file: &Path) -> Result<(Self, String)> {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            bail!("{} does not name a file", file.display());
        };
        let root = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((Self::new(root), name.to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = normalize_path(id)?;
        if relative.ends_with('/') {
            bail!("{} names a directory", id);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn load(&self, id: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.resolve(id)?).await?)
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(normalize_path(name)?)
    }

    async fn size(&self, id: &str) -> Result<u64> {
        Ok(tokio::fs::metadata(self.resolve(id)?).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let id = store.save("out/deck.pptx", b"PK\x05\x06").await.unwrap();
        assert_eq!(id, "out/deck.pptx");
        assert_eq!(store.load(&id).await.unwrap(), b"PK\x05\x06");
        assert_eq!(store.size(&id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_ids_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.save("dir/", b"").await.is_err());
    }

    #[test]
    fn test_for_file() {
        let (store, id) = LocalBlobStore::for_file(Path::new("decks/q1.pptx")).unwrap();
        assert_eq!(store.root(), Path::new("decks"));
        assert_eq!(id, "q1.pptx");
        let (store, _) = LocalBlobStore::for_file(Path::new("q1.pptx")).unwrap();
        assert_eq!(store.root(), Path::new("."));
    }
}
