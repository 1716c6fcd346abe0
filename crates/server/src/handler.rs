//! Protocol handler seam
//!
//! [`ServiceHandler`] is the capability interface between this core and the
//! external http/websocket parser plus user protocol logic: incoming bytes
//! flow out through [`on_bytes`](ServiceHandler::on_bytes), write
//! opportunities through [`on_writable`](ServiceHandler::on_writable), and
//! admission policy through
//! [`filter_connection`](ServiceHandler::filter_connection). It replaces a
//! per-server callback dispatch table with a trait each context holds one
//! implementation of.
//!
//! [`ServiceScope`] lends the handler the pieces of the context it may use
//! during a callback (the poll registry, a reusable format buffer, and the
//! file opener) so response helpers like
//! [`serve_http_file`](ServiceScope::serve_http_file) work without aliasing
//! the connection table.

use std::net::SocketAddr;

use bytes::BytesMut;
use mio::Registry;

use crate::connection::Connection;
use crate::fileio::FileOpener;

/// What a callback wants done with the connection afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep servicing the connection.
    Continue,
    /// Close and discard the connection.
    Close,
}

/// Context capabilities lent to a handler for the duration of one callback.
pub struct ServiceScope<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) fmt_buf: &'a mut BytesMut,
    pub(crate) opener: &'a dyn FileOpener,
}

impl std::fmt::Debug for ServiceScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope").finish_non_exhaustive()
    }
}

/// External parser / user protocol callbacks.
///
/// The informational hooks default to no-ops; `filter_connection` defaults
/// to accepting every peer.
pub trait ServiceHandler {
    /// Bytes read from an established connection, valid only for this call.
    /// The buffer is shared across the whole server, so implementations must
    /// consume it now, never retain it.
    fn on_bytes(&mut self, scope: &mut ServiceScope<'_>, conn: &mut Connection, data: &[u8]) -> Disposition;

    /// The connection is writable again and has no pending partial write;
    /// protocol logic may produce output now.
    fn on_writable(&mut self, scope: &mut ServiceScope<'_>, conn: &mut Connection) -> Disposition;

    /// Admission veto, invoked with the peer address before any resource
    /// beyond the bare socket exists. Returning `false` closes the socket
    /// immediately; no connection record is ever created.
    fn filter_connection(&mut self, peer_addr: SocketAddr) -> bool {
        let _ = peer_addr;
        true
    }

    /// A connection record exists (informational, no control flow).
    fn on_connection_created(&mut self, conn: &Connection) {
        let _ = conn;
    }

    /// The accepted client is fully instantiated (informational).
    fn on_client_instantiated(&mut self, conn: &Connection) {
        let _ = conn;
    }

    /// The connection is being closed; release any per-connection parser
    /// state (for example a partially filled header table). Called exactly
    /// once per connection.
    fn on_closed(&mut self, conn: &Connection) {
        let _ = conn;
    }
}
