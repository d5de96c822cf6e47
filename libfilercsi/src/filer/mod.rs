//! Narrow client interface to the remote filer namespace.
//!
//! The controller only needs three directory primitives: create, remove
//! tree, and existence check.  Each concrete filer implements
//! [`FilerClient`]; the controller never sees anything else of the backend.
//!
//! All operations address an entry as `(parent, name)` where `parent` is an
//! absolute filer path and `name` is a single path segment.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalFiler;
pub use memory::MemoryFiler;

/// Errors returned by filer implementations.
#[derive(Debug, Error)]
pub enum FilerError {
    #[error("{0} not found")]
    NotFound(String),

    /// A non-directory entry occupies the path.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is not empty")]
    DirectoryNotEmpty(String),

    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options for [`FilerClient::mkdir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MkdirOptions {
    /// Permission bits for the new directory.
    pub mode: u32,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self { mode: 0o770 }
    }
}

/// Options for [`FilerClient::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove directory contents as well.
    pub recursive: bool,
    /// Treat a missing entry as success.
    pub ignore_missing: bool,
}

/// Directory primitives over a remote hierarchical namespace.
///
/// Contract shared by every implementation:
///
/// * `mkdir` creates missing parents and succeeds if the directory already
///   exists; it fails with [`FilerError::AlreadyExists`] only when a
///   non-directory entry occupies the path.
/// * `remove` fails with [`FilerError::NotFound`] on absence unless
///   `ignore_missing` is set, and with [`FilerError::DirectoryNotEmpty`] on a
///   populated directory unless `recursive` is set.
/// * `exists` with `is_directory` only reports directories.
#[async_trait]
pub trait FilerClient: Send + Sync {
    async fn mkdir(&self, parent: &str, name: &str, opts: MkdirOptions) -> Result<(), FilerError>;

    async fn remove(&self, parent: &str, name: &str, opts: RemoveOptions)
    -> Result<(), FilerError>;

    async fn exists(&self, parent: &str, name: &str, is_directory: bool)
    -> Result<bool, FilerError>;
}

/// Whether `name` is usable as a single entry under a directory.
pub fn is_valid_name(name: &str) -> bool {
    !(name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0'))
}

/// Join an absolute filer directory and a single entry name.
///
/// Rejects names that would escape `parent` or span several segments.
pub fn join_path(parent: &str, name: &str) -> Result<String, FilerError> {
    if !is_valid_name(name) {
        return Err(FilerError::InvalidName(name.to_owned()));
    }
    let parent = parent.trim_end_matches('/');
    Ok(format!("{parent}/{name}"))
}

/// Split an absolute filer path into its non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_root_and_trailing_slash() {
        assert_eq!(join_path("/buckets", "v1").unwrap(), "/buckets/v1");
        assert_eq!(join_path("/buckets/", "v1").unwrap(), "/buckets/v1");
        assert_eq!(join_path("/", "buckets").unwrap(), "/buckets");
    }

    #[test]
    fn join_path_rejects_traversal() {
        for bad in ["", ".", "..", "a/b", "../etc"] {
            assert!(
                matches!(join_path("/buckets", bad), Err(FilerError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn valid_names() {
        assert!(is_valid_name("vol-1"));
        assert!(is_valid_name("..hidden"));
        assert!(!is_valid_name("ns/vol"));
        assert!(!is_valid_name("nul\0"));
    }

    #[test]
    fn segments_skip_empty_parts() {
        let parts: Vec<_> = segments("//buckets/./v1/").collect();
        assert_eq!(parts, vec!["buckets", "v1"]);
    }
}
