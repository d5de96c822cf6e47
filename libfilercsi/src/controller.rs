//! CSI Controller service trait.
//!
//! The Controller service manages the centralized volume lifecycle: creation,
//! deletion, capability validation, and capability enumeration.  It is
//! invoked by the orchestrator's control plane, never on worker nodes.
//!
//! The listing, capacity, snapshot and expansion RPCs are part of the
//! protocol surface but not supported; their default bodies return
//! [`CsiError::Unimplemented`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::capability::ServiceCapability;
use crate::error::CsiError;
use crate::types::{
    ControllerExpandVolumeRequest, ControllerPublishVolumeRequest,
    ControllerUnpublishVolumeRequest, CreateSnapshotRequest, CreateVolumeRequest,
    ValidateVolumeCapabilitiesResponse, Volume, VolumeCapability, VolumeId,
};

/// Controller service — centralized volume management.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a new volume.
    ///
    /// The returned [`Volume`] carries the derived `volume_id` and the
    /// request parameters as `volume_context`.
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError>;

    /// Delete a volume.  Deleting an absent volume succeeds.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError>;

    /// Attach a volume to a node, returning the publish context.
    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<HashMap<String, String>, CsiError>;

    /// Detach a volume from a node.
    async fn controller_unpublish_volume(
        &self,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError>;

    /// Check whether the given capabilities are compatible with the volume.
    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[VolumeCapability],
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError>;

    /// Controller RPCs advertised by this plugin.
    async fn controller_get_capabilities(&self) -> Result<Vec<ServiceCapability>, CsiError>;

    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError> {
        Err(CsiError::Unimplemented("ListVolumes".into()))
    }

    async fn get_capacity(&self) -> Result<u64, CsiError> {
        Err(CsiError::Unimplemented("GetCapacity".into()))
    }

    async fn create_snapshot(&self, _req: CreateSnapshotRequest) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("CreateSnapshot".into()))
    }

    async fn delete_snapshot(&self, _snapshot_id: &str) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("DeleteSnapshot".into()))
    }

    async fn list_snapshots(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("ListSnapshots".into()))
    }

    async fn controller_expand_volume(
        &self,
        _req: ControllerExpandVolumeRequest,
    ) -> Result<u64, CsiError> {
        Err(CsiError::Unimplemented("ControllerExpandVolume".into()))
    }
}
