//! Controller capability registry and access-mode matching.
//!
//! The [`CapabilityRegistry`] is built once at startup and shared read-only
//! (behind an `Arc`) by every request handler.

use serde::{Deserialize, Serialize};

use crate::error::CsiError;
use crate::types::{AccessMode, VolumeCapability};

/// Controller RPCs a plugin may advertise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCapability {
    CreateDeleteVolume,
    PublishUnpublishVolume,
    ListVolumes,
    GetCapacity,
    CreateDeleteSnapshot,
    ListSnapshots,
    CloneVolume,
    PublishReadonly,
    ExpandVolume,
}

/// Immutable record of what this controller instance supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRegistry {
    service: Vec<ServiceCapability>,
    access_modes: Vec<AccessMode>,
}

impl CapabilityRegistry {
    pub fn new(service: Vec<ServiceCapability>, access_modes: Vec<AccessMode>) -> Self {
        Self {
            service,
            access_modes,
        }
    }

    pub fn service_capabilities(&self) -> &[ServiceCapability] {
        &self.service
    }

    pub fn access_modes(&self) -> &[AccessMode] {
        &self.access_modes
    }

    /// Reject requests for RPCs this controller does not advertise.
    pub fn validate_service_request(&self, cap: ServiceCapability) -> Result<(), CsiError> {
        if self.service.contains(&cap) {
            return Ok(());
        }
        Err(CsiError::FailedPrecondition(format!(
            "controller capability {cap:?} is not supported"
        )))
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new(
            vec![ServiceCapability::CreateDeleteVolume],
            vec![AccessMode::SingleNodeWriter],
        )
    }
}

/// Returns `true` iff every requested access mode is in `supported`.
///
/// An empty `requested` slice is trivially supported; callers that require
/// at least one capability must check that separately.
pub fn all_supported(supported: &[AccessMode], requested: &[VolumeCapability]) -> bool {
    requested
        .iter()
        .all(|cap| supported.contains(&cap.access_mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[test]
    fn empty_request_is_supported() {
        assert!(all_supported(&[], &[]));
        assert!(all_supported(&[AccessMode::SingleNodeWriter], &[]));
    }

    #[test]
    fn any_missing_mode_fails() {
        let supported = [AccessMode::SingleNodeWriter];
        let requested = vec![
            VolumeCapability::with_mode(AccessMode::SingleNodeWriter),
            VolumeCapability::with_mode(AccessMode::MultiNodeMultiWriter),
        ];
        assert!(!all_supported(&supported, &requested));
        assert!(all_supported(&supported, &requested[..1]));
    }

    #[test]
    fn default_registry() {
        let reg = CapabilityRegistry::default();
        assert_eq!(
            reg.service_capabilities(),
            &[ServiceCapability::CreateDeleteVolume]
        );
        assert_eq!(reg.access_modes(), &[AccessMode::SingleNodeWriter]);
        assert!(
            reg.validate_service_request(ServiceCapability::CreateDeleteVolume)
                .is_ok()
        );
    }

    #[test]
    fn unadvertised_capability_rejected() {
        let reg = CapabilityRegistry::new(vec![], vec![AccessMode::SingleNodeWriter]);
        let err = reg
            .validate_service_request(ServiceCapability::CreateDeleteVolume)
            .unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }
}
