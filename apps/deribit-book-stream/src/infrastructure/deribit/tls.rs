//! TLS Client Context
//!
//! Builds the rustls client configuration used for the secure handshake:
//! TLS 1.2 or newer, peer certificates verified against the Mozilla root
//! set shipped in `webpki-roots`, no client authentication.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

/// Errors building the TLS context.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// rustls rejected the configuration.
    #[error("failed to build TLS client config: {0}")]
    Config(#[from] rustls::Error),
}

/// Build the client configuration.
///
/// # Errors
///
/// Returns an error if the crypto provider does not support the default
/// protocol versions.
pub fn client_config() -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Build a connector for the secure handshake.
///
/// # Errors
///
/// Returns an error if the client configuration cannot be built.
pub fn connector() -> Result<TlsConnector, TlsError> {
    Ok(TlsConnector::from(client_config()?))
}
