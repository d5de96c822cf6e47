//! In-memory filer used by tests and local experiments.
//!
//! Keeps every entry in a [`DashMap`] keyed by absolute path and counts the
//! calls it receives, so callers can assert that an operation never reached
//! the backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{FilerClient, FilerError, MkdirOptions, RemoveOptions, join_path, segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

#[derive(Default)]
pub struct MemoryFiler {
    entries: DashMap<String, EntryKind>,
    mkdir_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    exists_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryFiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the filer were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Place a regular file at `path`, creating parent directories.
    pub fn insert_file(&self, path: &str) {
        let parts: Vec<&str> = segments(path).collect();
        let mut current = String::new();
        for (i, seg) in parts.iter().enumerate() {
            current.push('/');
            current.push_str(seg);
            let kind = if i + 1 == parts.len() {
                EntryKind::File
            } else {
                EntryKind::Directory
            };
            self.entries.insert(current.clone(), kind);
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.entries.get(path).map(|e| *e.value()),
            Some(EntryKind::Directory)
        )
    }

    pub fn mkdir_calls(&self) -> usize {
        self.mkdir_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Total number of backend calls received.
    pub fn calls(&self) -> usize {
        self.mkdir_calls() + self.remove_calls() + self.exists_calls()
    }

    fn check_available(&self, path: &str) -> Result<(), FilerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FilerError::Io {
                path: path.to_owned(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "filer unavailable",
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FilerClient for MemoryFiler {
    async fn mkdir(&self, parent: &str, name: &str, _opts: MkdirOptions) -> Result<(), FilerError> {
        self.mkdir_calls.fetch_add(1, Ordering::SeqCst);
        let path = join_path(parent, name)?;
        self.check_available(&path)?;

        let mut current = String::new();
        for seg in segments(&path) {
            current.push('/');
            current.push_str(seg);
            let existing = self.entries.get(&current).map(|e| *e.value());
            match existing {
                Some(EntryKind::Directory) => {}
                Some(EntryKind::File) if current == path => {
                    return Err(FilerError::AlreadyExists(current));
                }
                Some(EntryKind::File) => return Err(FilerError::NotADirectory(current)),
                None => {
                    self.entries.insert(current.clone(), EntryKind::Directory);
                }
            }
        }
        Ok(())
    }

    async fn remove(
        &self,
        parent: &str,
        name: &str,
        opts: RemoveOptions,
    ) -> Result<(), FilerError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let path = join_path(parent, name)?;
        self.check_available(&path)?;

        let kind = self.entries.get(&path).map(|e| *e.value());
        match kind {
            None if opts.ignore_missing => Ok(()),
            None => Err(FilerError::NotFound(path)),
            Some(EntryKind::File) => {
                self.entries.remove(&path);
                Ok(())
            }
            Some(EntryKind::Directory) => {
                let prefix = format!("{path}/");
                let children: Vec<String> = self
                    .entries
                    .iter()
                    .filter(|e| e.key().starts_with(&prefix))
                    .map(|e| e.key().clone())
                    .collect();
                if !children.is_empty() && !opts.recursive {
                    return Err(FilerError::DirectoryNotEmpty(path));
                }
                for child in children {
                    self.entries.remove(&child);
                }
                self.entries.remove(&path);
                Ok(())
            }
        }
    }

    async fn exists(
        &self,
        parent: &str,
        name: &str,
        is_directory: bool,
    ) -> Result<bool, FilerError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        let path = join_path(parent, name)?;
        self.check_available(&path)?;

        Ok(match self.entries.get(&path).map(|e| *e.value()) {
            Some(EntryKind::Directory) => true,
            Some(EntryKind::File) => !is_directory,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mkdir_creates_parents() {
        let filer = MemoryFiler::new();
        filer
            .mkdir("/buckets", "v1", MkdirOptions::default())
            .await
            .unwrap();
        assert!(filer.is_dir("/buckets"));
        assert!(filer.is_dir("/buckets/v1"));
        assert_eq!(filer.mkdir_calls(), 1);
    }

    #[tokio::test]
    async fn mkdir_conflicts_with_file() {
        let filer = MemoryFiler::new();
        filer.insert_file("/buckets/v1");
        let err = filer
            .mkdir("/buckets", "v1", MkdirOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::AlreadyExists(p) if p == "/buckets/v1"));

        filer.insert_file("/blocked");
        let err = filer
            .mkdir("/blocked", "v1", MkdirOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::NotADirectory(p) if p == "/blocked"));
    }

    #[tokio::test]
    async fn remove_respects_options() {
        let filer = MemoryFiler::new();
        filer
            .mkdir("/buckets/v1", "nested", MkdirOptions::default())
            .await
            .unwrap();

        let err = filer
            .remove("/buckets", "v1", RemoveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::DirectoryNotEmpty(_)));

        filer
            .remove(
                "/buckets",
                "v1",
                RemoveOptions {
                    recursive: true,
                    ignore_missing: false,
                },
            )
            .await
            .unwrap();
        assert!(!filer.is_dir("/buckets/v1/nested"));
        assert!(!filer.exists("/buckets", "v1", true).await.unwrap());
        assert!(filer.is_dir("/buckets"));
    }

    #[tokio::test]
    async fn unavailable_filer_fails_every_call() {
        let filer = MemoryFiler::new();
        filer.set_unavailable(true);
        assert!(filer.exists("/buckets", "v1", true).await.is_err());
        assert!(
            filer
                .mkdir("/buckets", "v1", MkdirOptions::default())
                .await
                .is_err()
        );
        assert_eq!(filer.calls(), 2);
    }
}
