//! rustls configuration for the QUIC transport.
//!
//! Both sides pin the `ring` provider and TLS 1.3, which QUIC requires.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::CsiError;

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a server config from a DER certificate chain and private key.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<rustls::ServerConfig, CsiError> {
    rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(CsiError::transport)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| CsiError::TransportError(format!("invalid server certificate: {e}")))
}

/// Build a client config trusting `roots`.
pub fn client_config(
    roots: Vec<CertificateDer<'static>>,
) -> Result<rustls::ClientConfig, CsiError> {
    let mut store = rustls::RootCertStore::empty();
    for cert in roots {
        store
            .add(cert)
            .map_err(|e| CsiError::TransportError(format!("invalid root certificate: {e}")))?;
    }
    Ok(rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(CsiError::transport)?
        .with_root_certificates(store)
        .with_no_client_auth())
}

/// Load a server config from PEM files.
pub fn server_config_from_pem(cert: &Path, key: &Path) -> Result<rustls::ServerConfig, CsiError> {
    let certs = CertificateDer::pem_file_iter(cert)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| {
            CsiError::TransportError(format!("read certificates {}: {e}", cert.display()))
        })?;
    let key = PrivateKeyDer::from_pem_file(key).map_err(|e| {
        CsiError::TransportError(format!("read private key {}: {e}", key.display()))
    })?;
    server_config(certs, key)
}
