use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

/// Where the files of a book are kept until they are archived.
///
/// Paths are relative to the book root and use `/` separators, for example
/// `OEBPS/assets/cover.jpg`.
pub trait Storage {
    /// Store `bytes` at `path`, replacing anything already there.
    fn write<'a>(&'a self, path: &'a str, bytes: Vec<u8>)
    -> impl Future<Output = io::Result<()>> + 'a;

    /// Read back the bytes stored at `path`.
    fn read<'a>(&'a self, path: &'a str) -> impl Future<Output = io::Result<Vec<u8>>> + 'a;

    /// Drop every stored file.
    fn remove_all(&self) -> impl Future<Output = io::Result<()>> + '_;
}

// --- Implementation: Local Directory ---

/// Storage rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl Storage for FsStorage {
    fn write<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = io::Result<()>> + 'a {
        async move {
            let full = self.resolve(path);
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full, bytes).await?;
            debug!("Wrote {}", full.display());
            Ok(())
        }
    }

    fn read<'a>(&'a self, path: &'a str) -> impl Future<Output = io::Result<Vec<u8>>> + 'a {
        async move { tokio::fs::read(self.resolve(path)).await }
    }

    fn remove_all(&self) -> impl Future<Output = io::Result<()>> + '_ {
        async move {
            match tokio::fs::remove_dir_all(&self.root).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        }
    }
}

// --- Implementation: In-Memory ---

/// Storage that keeps every file in a map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn write<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = io::Result<()>> + 'a {
        async move {
            self.lock().insert(path.to_string(), bytes);
            Ok(())
        }
    }

    fn read<'a>(&'a self, path: &'a str) -> impl Future<Output = io::Result<Vec<u8>>> + 'a {
        async move {
            self.lock().get(path).cloned().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
            })
        }
    }

    fn remove_all(&self) -> impl Future<Output = io::Result<()>> + '_ {
        async move {
            self.lock().clear();
            Ok(())
        }
    }
}

// --- Selection ---

/// The storage chosen by configuration.
#[derive(Debug)]
pub enum Store {
    Fs(FsStorage),
    Memory(MemoryStorage),
}

impl Store {
    /// Directory holding the working tree, when there is one.
    pub fn root(&self) -> Option<&Path> {
        match self {
            Store::Fs(fs) => Some(fs.root()),
            Store::Memory(_) => None,
        }
    }
}

impl Storage for Store {
    fn write<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = io::Result<()>> + 'a {
        async move {
            match self {
                Store::Fs(fs) => fs.write(path, bytes).await,
                Store::Memory(mem) => mem.write(path, bytes).await,
            }
        }
    }

    fn read<'a>(&'a self, path: &'a str) -> impl Future<Output = io::Result<Vec<u8>>> + 'a {
        async move {
            match self {
                Store::Fs(fs) => fs.read(path).await,
                Store::Memory(mem) => mem.read(path).await,
            }
        }
    }

    fn remove_all(&self) -> impl Future<Output = io::Result<()>> + '_ {
        async move {
            match self {
                Store::Fs(fs) => fs.remove_all().await,
                Store::Memory(mem) => mem.remove_all().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage.write("OEBPS/a.txt", b"hello".to_vec()).await.unwrap();

        assert_eq!(storage.read("OEBPS/a.txt").await.unwrap(), b"hello");
        assert_eq!(storage.paths(), vec!["OEBPS/a.txt".to_string()]);

        let missing = storage.read("OEBPS/b.txt").await.unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);

        storage.remove_all().await.unwrap();
        assert!(storage.paths().is_empty());
    }

    #[tokio::test]
    async fn test_fs_storage_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path().join("book"));

        storage
            .write("OEBPS/assets/x.bin", vec![1, 2, 3])
            .await
            .unwrap();
        assert!(dir.path().join("book/OEBPS/assets/x.bin").is_file());
        assert_eq!(storage.read("OEBPS/assets/x.bin").await.unwrap(), vec![1, 2, 3]);

        storage.remove_all().await.unwrap();
        assert!(!dir.path().join("book").exists());
        // Removing twice is fine.
        storage.remove_all().await.unwrap();
    }

    #[test]
    fn test_fs_storage_ignores_parent_segments() {
        let storage = FsStorage::new("/tmp/root");
        assert_eq!(
            storage.resolve("../OEBPS/./x.html"),
            PathBuf::from("/tmp/root/OEBPS/x.html")
        );
    }
}
