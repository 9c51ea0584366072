//! Filesystem-backed state store: keys are paths below a scratch root.

use crate::key::check_key;
use dispatch_types::{StateStore, StateStoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// StateStore over a directory shared with worker processes.
///
/// `put` overwrites the whole file; nothing is locked, so a concurrent
/// reader may observe a truncated file and has to cope with that.
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StateStoreError> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Deepest directory fully named by `prefix`; listing starts there.
    fn start_dir(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => prefix[..idx]
                .split('/')
                .filter(|s| !s.is_empty())
                .fold(self.root.clone(), |p, seg| p.join(seg)),
            None => self.root.clone(),
        }
    }
}

fn io_err(key: &str, source: std::io::Error) -> StateStoreError {
    StateStoreError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl StateStore for FsStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(key, e)),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StateStoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(key, e))?;
        }
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| io_err(key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateStoreError> {
        let mut out = Vec::new();
        let mut pending = vec![self.start_dir(prefix)];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(&dir.to_string_lossy(), e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_err(&dir.to_string_lossy(), e))?
            {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    // Removed between read_dir and stat.
                    Err(_) => continue,
                };
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if file_type.is_dir() {
                    let as_dir = format!("{}/", key);
                    if as_dir.starts_with(prefix) || prefix.starts_with(&as_dir) {
                        pending.push(path);
                    }
                } else if key.starts_with(prefix) {
                    out.push(key);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize, StateStoreError> {
        let keys = self.list(prefix).await?;
        let mut dirs = Vec::new();
        for key in &keys {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(key, e)),
            }
            let mut parent = path.parent().map(Path::to_path_buf);
            while let Some(p) = parent {
                if p == self.root || !p.starts_with(&self.root) {
                    break;
                }
                parent = p.parent().map(Path::to_path_buf);
                dirs.push(p);
            }
        }
        // Deepest first; directories still holding other keys stay.
        dirs.sort();
        dirs.dedup();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            if let Err(e) = tokio::fs::remove_dir(&dir).await {
                tracing::trace!(dir = %dir.display(), error = %e, "directory kept");
            }
        }
        Ok(keys.len())
    }
}
