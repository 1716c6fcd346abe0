use std::io;
use thiserror::Error;

/// Errors surfaced while constructing or servicing a server context.
///
/// Per-connection failures (handshake errors, read/write errors, rejected
/// peers) are not represented here: they close the one affected connection
/// and are logged, never returned. `WouldBlock` is likewise never an error,
/// it is a suspension point handled inside the servicing paths.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("unable to resolve bind interface '{iface}'")]
    UnresolvableInterface { iface: String },

    #[error("invalid tls configuration: {reason}")]
    TlsConfig { reason: String },

    #[error("tls session setup failed: {source}")]
    TlsSession {
        #[from]
        source: rustls::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ServerError {
    pub fn bind(port: u16, source: io::Error) -> Self {
        Self::Bind { port, source }
    }

    pub fn unresolvable_interface<S: ToString>(iface: S) -> Self {
        Self::UnresolvableInterface { iface: iface.to_string() }
    }

    pub fn tls_config<S: ToString>(reason: S) -> Self {
        Self::TlsConfig { reason: reason.to_string() }
    }
}
