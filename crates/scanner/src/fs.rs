use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::{DirEntryInfo, DirectoryAccess};

/// Capability over one local directory. Lists only its direct children.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
    name: String,
}

impl FsDirectory {
    /// Open `path`, which must exist and be a directory.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let root = tokio::fs::canonicalize(path.as_ref()).await?;
        let meta = tokio::fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        Ok(Self { root, name })
    }

    fn entry_path(&self, name: &str) -> io::Result<PathBuf> {
        let rel = Path::new(name);
        let mut components = rel.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(rel)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{name:?} is not an entry of {}", self.name),
            )),
        }
    }
}

#[async_trait]
impl DirectoryAccess for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn token(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    async fn enumerate(&self) -> io::Result<Vec<DirEntryInfo>> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks; entries removed mid-listing are skipped.
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!("skipping {:?}: {}", name, e);
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            entries.push(DirEntryInfo {
                name,
                size: meta.len(),
                modified: modified.into(),
                is_file: meta.is_file(),
            });
        }
        Ok(entries)
    }

    async fn open_entry(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.entry_path(name)?;
        tokio::fs::read(path).await
    }

    async fn probe(&self) -> io::Result<()> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        dir.next_entry().await?;
        Ok(())
    }
}
