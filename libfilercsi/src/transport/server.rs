//! QUIC server that runs alongside the controller and dispatches incoming
//! CSI requests to the [`CsiIdentity`] + [`CsiController`] implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::message::CsiMessage;

/// Upper bound on a single request body.
const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// A CSI server that accepts QUIC connections and dispatches
/// [`CsiMessage`] requests to a handler.
pub struct CsiServer<T> {
    endpoint: quinn::Endpoint,
    handler: Arc<T>,
}

impl<T> CsiServer<T>
where
    T: CsiIdentity + CsiController + 'static,
{
    /// Create a new server bound to `addr`.
    pub fn new(
        addr: SocketAddr,
        tls_config: rustls::ServerConfig,
        handler: Arc<T>,
    ) -> Result<Self, CsiError> {
        let quic_server_config = QuicServerConfig::try_from(tls_config)
            .map_err(|e| CsiError::TransportError(format!("invalid TLS config: {e}")))?;
        let server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        let endpoint = quinn::Endpoint::server(server_config, addr).map_err(CsiError::transport)?;
        info!(%addr, "CSI QUIC server listening");
        Ok(Self { endpoint, handler })
    }

    /// Accept connections in a loop until the endpoint is closed.
    ///
    /// Each accepted connection spawns a Tokio task, and each bi-stream
    /// within a connection is handled concurrently.
    pub async fn serve(&self) -> Result<(), CsiError> {
        while let Some(incoming) = self.endpoint.accept().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => {
                        let remote = conn.remote_address();
                        debug!(%remote, "CSI connection accepted");
                        if let Err(e) = Self::handle_connection(conn, handler).await {
                            warn!(%remote, error = %e, "CSI connection error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "CSI incoming connection failed");
                    }
                }
            });
        }
        Ok(())
    }

    /// Handle all bi-streams on a single connection.
    async fn handle_connection(conn: quinn::Connection, handler: Arc<T>) -> Result<(), CsiError> {
        loop {
            let (send, recv) = match conn.accept_bi().await {
                Ok(stream) => stream,
                Err(quinn::ConnectionError::ApplicationClosed(_)) => return Ok(()),
                Err(e) => return Err(CsiError::transport(e)),
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = Self::handle_stream(send, recv, &handler).await {
                    error!(error = %e, "CSI stream handler error");
                }
            });
        }
    }

    /// Process a single bi-stream: read request → dispatch → write response.
    #[instrument(skip_all)]
    async fn handle_stream(
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
        handler: &T,
    ) -> Result<(), CsiError> {
        let buf = recv
            .read_to_end(MAX_REQUEST_BYTES)
            .await
            .map_err(CsiError::transport)?;

        let response = match serde_json::from_slice::<CsiMessage>(&buf) {
            Ok(request) => {
                debug!(%request, "CSI request received");
                dispatch(handler, request).await
            }
            Err(e) => {
                warn!(error = %e, "malformed CSI request");
                CsiMessage::Error(CsiError::InvalidArgument(format!(
                    "malformed request: {e}"
                )))
            }
        };

        let payload = serde_json::to_vec(&response).map_err(CsiError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(CsiError::transport)?;
        send.finish().map_err(CsiError::transport)?;
        Ok(())
    }

    /// Local address of the underlying QUIC endpoint.
    pub fn local_addr(&self) -> Result<SocketAddr, CsiError> {
        self.endpoint.local_addr().map_err(CsiError::transport)
    }

    /// Return a reference to the underlying QUIC endpoint, useful for
    /// shutting down.
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}

fn respond<V>(result: Result<V, CsiError>, ok: impl FnOnce(V) -> CsiMessage) -> CsiMessage {
    match result {
        Ok(v) => ok(v),
        Err(e) => CsiMessage::Error(e),
    }
}

/// Map a [`CsiMessage`] request to the correct trait method call and wrap
/// the result in a response [`CsiMessage`].
pub async fn dispatch<T>(handler: &T, request: CsiMessage) -> CsiMessage
where
    T: CsiIdentity + CsiController,
{
    match request {
        // --- Identity ---------------------------------------------------
        CsiMessage::Probe => respond(handler.probe().await, CsiMessage::ProbeResult),
        CsiMessage::GetPluginInfo => respond(
            handler.get_plugin_info().await,
            CsiMessage::PluginInfoResponse,
        ),
        CsiMessage::GetPluginCapabilities => respond(
            handler.get_plugin_capabilities().await,
            CsiMessage::PluginCapabilitiesResponse,
        ),

        // --- Controller -------------------------------------------------
        CsiMessage::CreateVolume(req) => {
            respond(handler.create_volume(req).await, CsiMessage::VolumeCreated)
        }
        CsiMessage::DeleteVolume(id) => {
            respond(handler.delete_volume(&id).await, |()| CsiMessage::Ok)
        }
        CsiMessage::ControllerPublishVolume(req) => respond(
            handler.controller_publish_volume(req).await,
            CsiMessage::PublishContext,
        ),
        CsiMessage::ControllerUnpublishVolume(req) => respond(
            handler.controller_unpublish_volume(req).await,
            |()| CsiMessage::Ok,
        ),
        CsiMessage::ValidateVolumeCapabilities {
            volume_id,
            capabilities,
        } => respond(
            handler
                .validate_volume_capabilities(&volume_id, &capabilities)
                .await,
            CsiMessage::ValidateResult,
        ),
        CsiMessage::ControllerGetCapabilities => respond(
            handler.controller_get_capabilities().await,
            CsiMessage::ControllerCapabilities,
        ),
        CsiMessage::ListVolumes => respond(handler.list_volumes().await, |_| CsiMessage::Ok),
        CsiMessage::GetCapacity => respond(handler.get_capacity().await, |_| CsiMessage::Ok),
        CsiMessage::CreateSnapshot(req) => {
            respond(handler.create_snapshot(req).await, |()| CsiMessage::Ok)
        }
        CsiMessage::DeleteSnapshot { snapshot_id } => respond(
            handler.delete_snapshot(&snapshot_id).await,
            |()| CsiMessage::Ok,
        ),
        CsiMessage::ListSnapshots => {
            respond(handler.list_snapshots().await, |()| CsiMessage::Ok)
        }
        CsiMessage::ControllerExpandVolume(req) => respond(
            handler.controller_expand_volume(req).await,
            |_| CsiMessage::Ok,
        ),

        // --- Response variants should never arrive as requests ----------
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            CsiMessage::Error(CsiError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FilerBackend;
    use crate::capability::CapabilityRegistry;
    use crate::error::Code;
    use crate::filer::MemoryFiler;
    use crate::types::*;

    fn backend() -> FilerBackend {
        FilerBackend::new(
            Arc::new(MemoryFiler::new()),
            Arc::new(CapabilityRegistry::default()),
            PluginInfo {
                name: "filer.csi.test".into(),
                vendor_version: "0.0.1".into(),
            },
            "/buckets",
        )
    }

    #[tokio::test]
    async fn dispatch_create_and_validate() {
        let backend = backend();
        let created = dispatch(
            &backend,
            CsiMessage::CreateVolume(CreateVolumeRequest {
                name: "Data".into(),
                volume_capabilities: vec![VolumeCapability::default()],
                capacity_range: Some(CapacityRange {
                    required_bytes: 5 << 30,
                    limit_bytes: 0,
                }),
                parameters: Default::default(),
            }),
        )
        .await;
        let vol = match created {
            CsiMessage::VolumeCreated(vol) => vol,
            other => panic!("unexpected response: {other}"),
        };
        assert_eq!(vol.volume_id.as_str(), "data");

        let resp = dispatch(
            &backend,
            CsiMessage::ValidateVolumeCapabilities {
                volume_id: vol.volume_id,
                capabilities: vec![VolumeCapability::with_mode(
                    AccessMode::MultiNodeMultiWriter,
                )],
            },
        )
        .await;
        assert!(
            matches!(resp, CsiMessage::ValidateResult(ref r) if r.confirmed.is_none() && !r.message.is_empty())
        );
    }

    #[tokio::test]
    async fn dispatch_maps_errors() {
        let backend = backend();
        let resp = dispatch(&backend, CsiMessage::DeleteVolume(VolumeId::from(""))).await;
        assert!(matches!(resp, CsiMessage::Error(ref e) if e.code() == Code::InvalidArgument));

        let resp = dispatch(&backend, CsiMessage::ListSnapshots).await;
        assert!(matches!(resp, CsiMessage::Error(ref e) if e.code() == Code::Unimplemented));
    }

    #[tokio::test]
    async fn dispatch_rejects_response_variants() {
        let backend = backend();
        let resp = dispatch(&backend, CsiMessage::ProbeResult(true)).await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn dispatch_identity() {
        let backend = backend();
        let resp = dispatch(&backend, CsiMessage::Probe).await;
        assert!(matches!(resp, CsiMessage::ProbeResult(true)));

        let resp = dispatch(&backend, CsiMessage::ControllerGetCapabilities).await;
        assert!(matches!(resp, CsiMessage::ControllerCapabilities(ref caps) if caps.len() == 1));
    }
}
