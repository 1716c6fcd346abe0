//! Server configuration
//!
//! [`ServerConfig`] collects everything the context needs before it starts
//! servicing events: where (and whether) to listen, the optional TLS layer,
//! and the listener fairness throttle. Setters follow the builder style so a
//! config reads as one chained expression.
//!
//! # Example
//!
//! ```no_run
//! use micro_server::config::ServerConfig;
//!
//! let config = ServerConfig::new().port(8080).ipv6(false);
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::error::ServerError;

/// How often the listening socket is serviced relative to established
/// connections: only every Nth pass once other connections exist, so a busy
/// listener cannot starve their readiness processing.
pub const DEFAULT_LISTEN_SERVICE_MODULO: u32 = 10;

/// TLS layer configuration for a listening socket.
pub struct TlsOptions {
    /// Session parameters handed to every accepted connection.
    pub server_config: Arc<rustls::ServerConfig>,
    /// Permit cleartext HTTP on the TLS port, classified by sniffing the
    /// first byte before any handshake attempt. Disabled by default since it
    /// goes around TLS-level access control such as client certificates.
    pub allow_cleartext: bool,
}

impl std::fmt::Debug for TlsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsOptions").field("allow_cleartext", &self.allow_cleartext).finish_non_exhaustive()
    }
}

impl TlsOptions {
    /// Loads a certificate chain and private key from PEM files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, ServerError> {
        let mut cert_reader = BufReader::new(File::open(cert_path)?);
        let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(ServerError::tls_config(format!("no certificates in '{}'", cert_path.display())));
        }

        let mut key_reader = BufReader::new(File::open(key_path)?);
        let key = rustls_pemfile::private_key(&mut key_reader)?
            .ok_or_else(|| ServerError::tls_config(format!("no private key in '{}'", key_path.display())))?;

        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::tls_config(e.to_string()))?;

        Ok(Self { server_config: Arc::new(server_config), allow_cleartext: false })
    }

    pub fn allow_cleartext(mut self, allow: bool) -> Self {
        self.allow_cleartext = allow;
        self
    }
}

/// Creation-time parameters for a [`ServerContext`](crate::server::ServerContext).
///
/// A config without a port requests a server with no listener at all; the
/// context then only services connections adopted by other means, and
/// construction still succeeds.
#[derive(Debug)]
pub struct ServerConfig {
    pub(crate) port: Option<u16>,
    pub(crate) iface: Option<String>,
    pub(crate) ipv6: bool,
    pub(crate) tls: Option<TlsOptions>,
    pub(crate) listen_service_modulo: u32,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self { port: None, iface: None, ipv6: false, tls: None, listen_service_modulo: DEFAULT_LISTEN_SERVICE_MODULO }
    }

    /// Requests a listener on `port`. Port 0 asks the OS for any free port;
    /// the concrete port is reported by the bound listener afterwards.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Binds to a named interface or host instead of the unspecified address.
    pub fn iface<S: Into<String>>(mut self, iface: S) -> Self {
        self.iface = Some(iface.into());
        self
    }

    pub fn ipv6(mut self, enabled: bool) -> Self {
        self.ipv6 = enabled;
        self
    }

    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn listen_service_modulo(mut self, modulo: u32) -> Self {
        self.listen_service_modulo = modulo.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new();
        assert!(config.port.is_none());
        assert!(config.iface.is_none());
        assert!(config.tls.is_none());
        assert!(!config.ipv6);
        assert_eq!(config.listen_service_modulo, DEFAULT_LISTEN_SERVICE_MODULO);
    }

    #[test]
    fn test_builder_setters() {
        let config = ServerConfig::new().port(8080).iface("localhost").ipv6(true).listen_service_modulo(4);
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.iface.as_deref(), Some("localhost"));
        assert!(config.ipv6);
        assert_eq!(config.listen_service_modulo, 4);
    }

    #[test]
    fn test_modulo_never_zero() {
        let config = ServerConfig::new().listen_service_modulo(0);
        assert_eq!(config.listen_service_modulo, 1);
    }
}
