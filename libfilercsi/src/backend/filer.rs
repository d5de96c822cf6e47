//! Filer-backed CSI controller.
//!
//! [`FilerBackend`] implements [`CsiIdentity`] and [`CsiController`] on top
//! of any [`FilerClient`].  Every volume is one directory in the filer; no
//! other state is kept, so existence is always asked of the filer.
//!
//! # Filer layout
//!
//! ```text
//! <bucket_root>/          # `/buckets` by default
//!   <volume-id>/          # one directory per volume, removed recursively
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, trace};

use crate::capability::{CapabilityRegistry, ServiceCapability, all_supported};
use crate::config::DriverConfig;
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::filer::{FilerClient, MkdirOptions, RemoveOptions, is_valid_name};
use crate::identity::CsiIdentity;
use crate::types::*;

/// Smallest volume the controller provisions.
pub const MIN_VOLUME_BYTES: u64 = 1 << 30;

/// Capacity, in GiB, covered by one backend storage volume.  Only used for
/// the informational volume-count estimate.
const GIB_PER_BACKEND_VOLUME: u64 = 30;

/// The only access mode a volume can be published with.
const SUPPORTED_ACCESS_MODE: AccessMode = AccessMode::SingleNodeWriter;

/// Concrete CSI controller backed by a filer namespace.
///
/// # Thread safety
///
/// The backend holds no mutable state.  The capability registry is shared
/// read-only, so concurrent requests need no locking here; races between
/// requests for the same volume are settled by the filer.
pub struct FilerBackend {
    filer: Arc<dyn FilerClient>,
    registry: Arc<CapabilityRegistry>,
    plugin_info: PluginInfo,
    /// Filer directory holding one sub-directory per volume.
    bucket_root: String,
}

impl FilerBackend {
    pub fn new(
        filer: Arc<dyn FilerClient>,
        registry: Arc<CapabilityRegistry>,
        plugin_info: PluginInfo,
        bucket_root: impl Into<String>,
    ) -> Self {
        Self {
            filer,
            registry,
            plugin_info,
            bucket_root: bucket_root.into(),
        }
    }

    /// Build a backend from a loaded [`DriverConfig`].
    pub fn from_config(config: &DriverConfig, filer: Arc<dyn FilerClient>) -> Self {
        Self::new(
            filer,
            Arc::new(config.registry()),
            PluginInfo {
                name: config.driver_name.clone(),
                vendor_version: config.vendor_version.clone(),
            },
            config.bucket_root.clone(),
        )
    }

    /// Reject ids that cannot name one directory directly under the bucket root.
    fn check_volume_id(volume_id: &VolumeId) -> Result<(), CsiError> {
        if is_valid_name(volume_id.as_str()) {
            return Ok(());
        }
        Err(CsiError::InvalidArgument(format!(
            "volume id {volume_id:?} must be a single path segment"
        )))
    }

    fn volume_path(&self, volume_id: &VolumeId) -> String {
        format!("{}/{}", self.bucket_root.trim_end_matches('/'), volume_id)
    }

    /// Split the bucket root into the `(parent, name)` pair the filer expects.
    fn bucket_root_entry(&self) -> (&str, &str) {
        let root = self.bucket_root.trim_end_matches('/');
        match root.rfind('/') {
            Some(0) => ("/", &root[1..]),
            Some(idx) => (&root[..idx], &root[idx + 1..]),
            None => ("/", root),
        }
    }
}

// ---------------------------------------------------------------------------
// CsiIdentity
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiIdentity for FilerBackend {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(self.plugin_info.clone())
    }

    async fn probe(&self) -> Result<bool, CsiError> {
        // Healthy as long as the filer answers; the bucket root itself is
        // only created by the first CreateVolume.
        let (parent, name) = self.bucket_root_entry();
        if name.is_empty() {
            return Ok(true);
        }
        match self.filer.exists(parent, name, true).await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(error = %e, "filer probe failed");
                Ok(false)
            }
        }
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(vec![PluginCapability::ControllerService])
    }
}

// ---------------------------------------------------------------------------
// CsiController
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiController for FilerBackend {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError> {
        let volume_id = VolumeId::sanitize(&req.name);

        if let Err(e) = self
            .registry
            .validate_service_request(ServiceCapability::CreateDeleteVolume)
        {
            trace!(?req, "invalid create volume request");
            return Err(e);
        }

        if volume_id.is_empty() {
            return Err(CsiError::InvalidArgument("Name missing in request".into()));
        }
        Self::check_volume_id(&volume_id)?;
        if req.volume_capabilities.is_empty() {
            return Err(CsiError::InvalidArgument(
                "Volume Capabilities missing in request".into(),
            ));
        }

        trace!(parameters = ?req.parameters, "create volume parameters");
        let capacity = req.capacity_range.map(|r| r.required_bytes).unwrap_or(0);
        if capacity < MIN_VOLUME_BYTES {
            return Err(CsiError::InvalidArgument(
                "required bytes less than 1GiB".into(),
            ));
        }
        let backend_volume_count = ((capacity >> 30) / GIB_PER_BACKEND_VOLUME).max(1);
        debug!(%volume_id, capacity, backend_volume_count, "provisioning volume");

        self.filer
            .mkdir(&self.bucket_root, volume_id.as_str(), MkdirOptions::default())
            .await
            .map_err(|e| {
                CsiError::BackendError(format!(
                    "create volume directory {}: {e}",
                    self.volume_path(&volume_id)
                ))
            })?;

        info!(%volume_id, capacity, "volume created");
        Ok(Volume {
            volume_id,
            capacity_bytes: capacity,
            volume_context: req.parameters,
        })
    }

    #[instrument(skip(self))]
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        if volume_id.is_empty() {
            return Err(CsiError::InvalidArgument(
                "Volume ID missing in request".into(),
            ));
        }
        Self::check_volume_id(volume_id)?;

        if let Err(e) = self
            .registry
            .validate_service_request(ServiceCapability::CreateDeleteVolume)
        {
            trace!("invalid delete volume request");
            return Err(e);
        }
        debug!("deleting volume");

        let opts = RemoveOptions {
            recursive: true,
            ignore_missing: true,
        };
        self.filer
            .remove(&self.bucket_root, volume_id.as_str(), opts)
            .await
            .map_err(|e| {
                CsiError::BackendError(format!(
                    "remove volume directory {}: {e}",
                    self.volume_path(volume_id)
                ))
            })?;

        info!(%volume_id, "volume deleted");
        Ok(())
    }

    async fn controller_publish_volume(
        &self,
        _req: ControllerPublishVolumeRequest,
    ) -> Result<HashMap<String, String>, CsiError> {
        // The filer namespace is reachable from every node; nothing to attach.
        Ok(HashMap::new())
    }

    async fn controller_unpublish_volume(
        &self,
        _req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        Ok(())
    }

    #[instrument(skip(self, capabilities), fields(requested = capabilities.len()))]
    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[VolumeCapability],
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError> {
        if volume_id.is_empty() {
            return Err(CsiError::InvalidArgument(
                "Volume ID missing in request".into(),
            ));
        }
        Self::check_volume_id(volume_id)?;
        if capabilities.is_empty() {
            return Err(CsiError::InvalidArgument(
                "Volume capabilities missing in request".into(),
            ));
        }

        let exists = self
            .filer
            .exists(&self.bucket_root, volume_id.as_str(), true)
            .await
            .map_err(|e| {
                CsiError::BackendError(format!(
                    "check volume directory {} exists: {e}",
                    self.volume_path(volume_id)
                ))
            })?;
        if !exists {
            return Err(CsiError::VolumeNotFound(volume_id.to_string()));
        }

        if let Some(cap) = capabilities
            .iter()
            .find(|cap| cap.access_mode != SUPPORTED_ACCESS_MODE)
        {
            debug!(mode = %cap.access_mode, "unsupported access mode requested");
            return Ok(ValidateVolumeCapabilitiesResponse::rejected(
                "Only single node writer is supported",
            ));
        }

        if all_supported(self.registry.access_modes(), capabilities) {
            Ok(ValidateVolumeCapabilitiesResponse::confirmed(
                capabilities.to_vec(),
            ))
        } else {
            Ok(ValidateVolumeCapabilitiesResponse::default())
        }
    }

    async fn controller_get_capabilities(&self) -> Result<Vec<ServiceCapability>, CsiError> {
        Ok(self.registry.service_capabilities().to_vec())
    }
}
