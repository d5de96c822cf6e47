//! Controller configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables.  The binary applies CLI flags on top.
//!
//! Environment variables:
//! - `FILERCSI_DRIVER_NAME`: plugin name reported by `GetPluginInfo`.
//! - `FILERCSI_BUCKET_ROOT`: filer directory holding one directory per volume.
//!   Defaults to `/buckets`.
//! - `FILERCSI_LISTEN_ADDR`: QUIC listen address.  Defaults to `0.0.0.0:10000`.
//! - `FILERCSI_FILER_MOUNT`: local mount point of the filer.
//! - `FILERCSI_TLS_CERT` / `FILERCSI_TLS_KEY`: PEM certificate chain and key.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{CapabilityRegistry, ServiceCapability};
use crate::types::AccessMode;

pub const DEFAULT_DRIVER_NAME: &str = "filer.csi.rk8s.io";
pub const DEFAULT_BUCKET_ROOT: &str = "/buckets";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings for one controller process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    pub driver_name: String,
    pub vendor_version: String,
    /// Filer directory under which each volume gets its own directory.
    pub bucket_root: String,
    pub listen_addr: SocketAddr,
    /// Where the filer namespace is mounted on this host.
    pub filer_mount: PathBuf,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub controller_capabilities: Vec<ServiceCapability>,
    pub access_modes: Vec<AccessMode>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        let registry = CapabilityRegistry::default();
        Self {
            driver_name: DEFAULT_DRIVER_NAME.to_owned(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
            bucket_root: DEFAULT_BUCKET_ROOT.to_owned(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 10000)),
            filer_mount: PathBuf::from("/mnt/filer"),
            tls_cert: None,
            tls_key: None,
            controller_capabilities: registry.service_capabilities().to_vec(),
            access_modes: registry.access_modes().to_vec(),
        }
    }
}

impl DriverConfig {
    /// Load from an optional YAML file and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override fields from `FILERCSI_*` variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FILERCSI_DRIVER_NAME") {
            self.driver_name = v;
        }
        if let Some(v) = lookup("FILERCSI_BUCKET_ROOT") {
            self.bucket_root = v;
        }
        if let Some(v) = lookup("FILERCSI_LISTEN_ADDR") {
            self.listen_addr = v.parse().map_err(|e| ConfigError::Invalid {
                key: "FILERCSI_LISTEN_ADDR",
                reason: format!("{v:?}: {e}"),
            })?;
        }
        if let Some(v) = lookup("FILERCSI_FILER_MOUNT") {
            self.filer_mount = PathBuf::from(v);
        }
        if let Some(v) = lookup("FILERCSI_TLS_CERT") {
            self.tls_cert = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FILERCSI_TLS_KEY") {
            self.tls_key = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver_name.is_empty() {
            return Err(ConfigError::Invalid {
                key: "driver_name",
                reason: "must not be empty".into(),
            });
        }
        if !self.bucket_root.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "bucket_root",
                reason: format!("{:?} is not an absolute filer path", self.bucket_root),
            });
        }
        Ok(())
    }

    /// Build the immutable capability registry for the controller.
    pub fn registry(&self) -> CapabilityRegistry {
        CapabilityRegistry::new(
            self.controller_capabilities.clone(),
            self.access_modes.clone(),
        )
    }
}
