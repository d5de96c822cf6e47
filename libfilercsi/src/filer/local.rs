//! Filer backed by a local directory tree.
//!
//! Intended for a filer that is FUSE-mounted on the controller host: filer
//! path `/buckets/<id>` maps to `<mount_root>/buckets/<id>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{FilerClient, FilerError, MkdirOptions, RemoveOptions, join_path, segments};

pub struct LocalFiler {
    mount_root: PathBuf,
}

impl LocalFiler {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    /// Map an absolute filer path onto the local mount.
    fn local_path(&self, filer_path: &str) -> PathBuf {
        segments(filer_path).fold(self.mount_root.clone(), |acc, seg| acc.join(seg))
    }

    fn io_err(path: &Path, source: std::io::Error) -> FilerError {
        FilerError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl FilerClient for LocalFiler {
    async fn mkdir(&self, parent: &str, name: &str, opts: MkdirOptions) -> Result<(), FilerError> {
        let filer_path = join_path(parent, name)?;
        let path = self.local_path(&filer_path);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                debug!(path = %filer_path, "directory already present");
                return Ok(());
            }
            Ok(_) => return Err(FilerError::AlreadyExists(filer_path)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Self::io_err(&path, e)),
        }

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| Self::io_err(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(opts.mode))
                .await
                .map_err(|e| Self::io_err(&path, e))?;
        }
        #[cfg(not(unix))]
        let _ = opts;

        Ok(())
    }

    async fn remove(
        &self,
        parent: &str,
        name: &str,
        opts: RemoveOptions,
    ) -> Result<(), FilerError> {
        let filer_path = join_path(parent, name)?;
        let path = self.local_path(&filer_path);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if opts.ignore_missing {
                    return Ok(());
                }
                return Err(FilerError::NotFound(filer_path));
            }
            Err(e) => return Err(Self::io_err(&path, e)),
        };

        let result = if !meta.is_dir() {
            tokio::fs::remove_file(&path).await
        } else if opts.recursive {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_dir(&path).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && opts.ignore_missing => Ok(()),
            Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
                Err(FilerError::DirectoryNotEmpty(filer_path))
            }
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    async fn exists(
        &self,
        parent: &str,
        name: &str,
        is_directory: bool,
    ) -> Result<bool, FilerError> {
        let filer_path = join_path(parent, name)?;
        let path = self.local_path(&filer_path);

        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(!is_directory || meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mkdir_creates_parents_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let filer = LocalFiler::new(tmp.path());

        filer
            .mkdir("/buckets", "vol-a", MkdirOptions::default())
            .await
            .unwrap();
        assert!(tmp.path().join("buckets/vol-a").is_dir());

        filer
            .mkdir("/buckets", "vol-a", MkdirOptions::default())
            .await
            .unwrap();
        assert!(filer.exists("/buckets", "vol-a", true).await.unwrap());
    }

    #[tokio::test]
    async fn mkdir_over_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("buckets")).unwrap();
        std::fs::write(tmp.path().join("buckets/taken"), b"x").unwrap();

        let filer = LocalFiler::new(tmp.path());
        let err = filer
            .mkdir("/buckets", "taken", MkdirOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::AlreadyExists(p) if p == "/buckets/taken"));
    }

    #[tokio::test]
    async fn exists_distinguishes_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("buckets")).unwrap();
        std::fs::write(tmp.path().join("buckets/file"), b"x").unwrap();

        let filer = LocalFiler::new(tmp.path());
        assert!(filer.exists("/buckets", "file", false).await.unwrap());
        assert!(!filer.exists("/buckets", "file", true).await.unwrap());
        assert!(!filer.exists("/buckets", "missing", true).await.unwrap());
    }

    #[tokio::test]
    async fn remove_recursive_and_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let filer = LocalFiler::new(tmp.path());
        filer
            .mkdir("/buckets", "vol", MkdirOptions::default())
            .await
            .unwrap();
        std::fs::write(tmp.path().join("buckets/vol/data"), b"payload").unwrap();

        let err = filer
            .remove("/buckets", "vol", RemoveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::DirectoryNotEmpty(_)));

        let opts = RemoveOptions {
            recursive: true,
            ignore_missing: true,
        };
        filer.remove("/buckets", "vol", opts).await.unwrap();
        assert!(!tmp.path().join("buckets/vol").exists());

        // Second removal is a no-op.
        filer.remove("/buckets", "vol", opts).await.unwrap();

        let err = filer
            .remove("/buckets", "vol", RemoveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_escaping_names() {
        let tmp = tempfile::tempdir().unwrap();
        let filer = LocalFiler::new(tmp.path());
        let err = filer
            .mkdir("/buckets", "../outside", MkdirOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::InvalidName(_)));
    }
}
