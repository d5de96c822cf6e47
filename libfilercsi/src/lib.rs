//! # libfilercsi — CSI volume controller over a remote filer
//!
//! `libfilercsi` implements the controller side of the [Container Storage
//! Interface][csi] for a hierarchical filer: each volume is one directory
//! under a bucket root (`/buckets/<volume-id>`).  Requests travel over QUIC
//! (via [`quinn`]) and follow the RK8s conventions (Tokio async runtime,
//! `tracing` for observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `Volume`, `VolumeId` (and its sanitizer), capabilities, requests. |
//! | [`capability`] | Immutable [`CapabilityRegistry`] and access-mode matching. |
//! | [`error`] | [`CsiError`] enum and its status [`Code`]. |
//! | [`message`] | [`CsiMessage`] protocol envelope for QUIC transport. |
//! | [`identity`] | [`CsiIdentity`] trait — plugin discovery & health. |
//! | [`controller`] | [`CsiController`] trait — volume lifecycle. |
//! | [`filer`] | [`FilerClient`] trait plus local and in-memory filers. |
//! | [`backend`] | [`FilerBackend`], the controller built on a filer. |
//! | [`config`] | [`DriverConfig`] loaded from YAML and the environment. |
//! | [`transport`] | QUIC client/server built on `quinn`. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod backend;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod filer;
pub mod identity;
pub mod message;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::FilerBackend;
pub use capability::{CapabilityRegistry, ServiceCapability, all_supported};
pub use config::DriverConfig;
pub use controller::CsiController;
pub use error::{Code, CsiError};
pub use filer::FilerClient;
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use types::*;
