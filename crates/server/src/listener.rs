//! Listening socket
//!
//! One [`Listener`] per bound port, living for the whole server process. The
//! socket is non-blocking and address-reuse is enabled so the server can
//! restart while old sockets linger in TIME_WAIT. Accepting is a single
//! non-blocking attempt per readiness event: `WouldBlock` means "nothing
//! pending, try again on the next notification", and any other accept error
//! is the caller's to log and ignore; an accept failure never closes the
//! listener itself.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use mio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ServerError;

/// A bound, listening, non-blocking socket.
#[derive(Debug)]
pub struct Listener {
    socket: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Creates the listening socket described by `config`.
    ///
    /// Returns `Ok(None)` when no port was requested, since a server with zero
    /// listeners is a supported configuration. On bind failure the partially
    /// created socket is dropped here, nothing leaks to the caller. When
    /// port 0 was requested, [`local_addr`](Self::local_addr) reports the
    /// concrete port the OS picked.
    pub fn bind(config: &ServerConfig) -> Result<Option<Self>, ServerError> {
        let Some(port) = config.port else {
            return Ok(None);
        };

        let addr = resolve_bind_addr(config, port)?;
        let socket = TcpListener::bind(addr).map_err(|e| ServerError::bind(port, e))?;
        let local_addr = socket.local_addr()?;
        info!(port = local_addr.port(), "listening on port");

        Ok(Some(Self { socket, local_addr }))
    }

    /// The concrete bound address, useful when "any free port" was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn socket_mut(&mut self) -> &mut TcpListener {
        &mut self.socket
    }

    /// One non-blocking accept attempt.
    ///
    /// `WouldBlock` is not a failure; `Interrupted` is retried in place as
    /// the signal-interruption equivalent.
    pub fn accept_one(&self) -> io::Result<(TcpStream, SocketAddr)> {
        loop {
            match self.socket.accept() {
                Ok(pair) => return Ok(pair),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Resolves the configured interface to a concrete socket address, defaulting
/// to the unspecified address of the configured family.
fn resolve_bind_addr(config: &ServerConfig, port: u16) -> Result<SocketAddr, ServerError> {
    match &config.iface {
        Some(iface) => {
            let mut candidates = match (iface.as_str(), port).to_socket_addrs() {
                Ok(candidates) => candidates,
                Err(e) => {
                    debug!(iface = %iface, cause = %e, "interface resolution failed");
                    return Err(ServerError::unresolvable_interface(iface));
                }
            };
            candidates
                .find(|addr| addr.is_ipv6() == config.ipv6)
                .or_else(|| (iface.as_str(), port).to_socket_addrs().ok()?.next())
                .ok_or_else(|| ServerError::unresolvable_interface(iface))
        }
        None if config.ipv6 => Ok(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))),
        None => Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))),
    }
}
