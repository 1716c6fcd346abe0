//! Per-connection state
//!
//! A [`Connection`] is one accepted transport stream plus everything the
//! dispatcher needs to route its readiness events: the current
//! [`ConnectionMode`], the optional TLS session, the at-most-one pending
//! (truncated) write, the timeout the external sweep reaps on, and the http
//! sub-state used while issuing a file.
//!
//! The record owns its socket exclusively until it is closed; dropping the
//! record releases the socket, the TLS session, the pending-write buffer and
//! any open file source in one step.
//!
//! # Invariants
//!
//! - Exactly one mode is active at a time.
//! - While a pending write exists, no new write may be issued: callers check
//!   [`has_pending_write`](Connection::has_pending_write) and drain via
//!   [`flush_pending`](Connection::flush_pending) first.

mod io;

pub(crate) use io::ReadOutcome;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

use crate::fileio::FileSource;

/// Transport/negotiation mode of a connection, driving event dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Established transport serving http; the initial mode after accept and
    /// the mode a completed TLS handshake lands back in.
    HttpServing,
    /// Http connection whose upgrade/acceptance completed upstream; serviced
    /// identically to [`HttpServing`](Self::HttpServing).
    HttpServingAccepted,
    /// TLS accept handshake in progress; events route to the handshake
    /// driver until it completes, falls back to cleartext, or fails.
    TlsAckPending,
}

/// Why a connection timeout is armed, for the external reaping sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// Waiting for the peer to begin speaking after transport establishment.
    EstablishingTransport,
    /// Waiting for the TLS accept handshake to finish.
    TlsAccept,
}

/// An armed timeout: monotonic deadline plus the reason tag.
#[derive(Debug, Clone, Copy)]
pub struct PendingTimeout {
    pub deadline: Instant,
    pub reason: TimeoutReason,
}

/// Http-level sub-state, meaningful only while the mode is http-related.
pub enum HttpState {
    /// Reading/parsing request headers (the parser itself is external).
    NegotiatingHeaders,
    /// Streaming a file response fragment by fragment.
    IssuingFile(FileCursor),
}

/// Progress cursor for a file being issued.
pub struct FileCursor {
    pub(crate) source: Box<dyn FileSource>,
    pub(crate) length: u64,
    pub(crate) sent: u64,
}

impl std::fmt::Debug for FileCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCursor").field("length", &self.length).field("sent", &self.sent).finish_non_exhaustive()
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegotiatingHeaders => f.write_str("NegotiatingHeaders"),
            Self::IssuingFile(cursor) => f.debug_tuple("IssuingFile").field(cursor).finish(),
        }
    }
}

/// One accepted transport connection and its negotiation state.
pub struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) tls: Option<rustls::ServerConnection>,
    peer_addr: SocketAddr,
    token: Token,
    mode: ConnectionMode,
    http_state: HttpState,
    pending: Option<Bytes>,
    timeout: Option<PendingTimeout>,
    hdr_parsing_completed: bool,
    interest: Interest,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("token", &self.token)
            .field("mode", &self.mode)
            .field("tls", &self.tls.is_some())
            .field("http_state", &self.http_state)
            .field("pending", &self.pending.as_ref().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer_addr: SocketAddr, token: Token) -> Self {
        Self {
            stream,
            tls: None,
            peer_addr,
            token,
            mode: ConnectionMode::HttpServing,
            http_state: HttpState::NegotiatingHeaders,
            pending: None,
            timeout: None,
            hdr_parsing_completed: false,
            interest: Interest::READABLE.add(Interest::WRITABLE),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Mode transitions are driven by the dispatcher and the handshake
    /// driver; the external parser flips to `HttpServingAccepted` once the
    /// http connection is fully accepted upstream.
    pub fn set_mode(&mut self, mode: ConnectionMode) {
        self.mode = mode;
    }

    /// Whether a TLS session is attached (cleartext fallback clears this).
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn http_state(&self) -> &HttpState {
        &self.http_state
    }

    pub(crate) fn http_state_mut(&mut self) -> &mut HttpState {
        &mut self.http_state
    }

    pub(crate) fn set_http_state(&mut self, state: HttpState) {
        self.http_state = state;
    }

    pub fn hdr_parsing_completed(&self) -> bool {
        self.hdr_parsing_completed
    }

    pub fn set_hdr_parsing_completed(&mut self, completed: bool) {
        self.hdr_parsing_completed = completed;
    }

    /// Arms (or re-arms, resetting the clock) the reaping timeout.
    pub fn set_timeout(&mut self, reason: TimeoutReason, duration: Duration) {
        self.timeout = Some(PendingTimeout { deadline: Instant::now() + duration, reason });
    }

    pub fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    pub fn timeout(&self) -> Option<PendingTimeout> {
        self.timeout
    }

    /// Discards the TLS session, continuing as cleartext http. Used by the
    /// sniff fallback before any handshake byte was consumed.
    pub(crate) fn discard_tls(&mut self) {
        self.tls = None;
    }

    /// True while an earlier write has not fully drained; new writes are
    /// forbidden until this clears. Covers both the explicit pending buffer
    /// (plain sockets) and ciphertext buffered inside the TLS session.
    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some() || self.tls.as_ref().is_some_and(|tls| tls.wants_write())
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Bytes::len)
    }

    pub(crate) fn set_pending(&mut self, data: Bytes) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(data);
    }

    pub(crate) fn take_pending(&mut self) -> Option<Bytes> {
        self.pending.take()
    }

    pub(crate) fn register(&mut self, registry: &Registry) -> std::io::Result<()> {
        registry.register(&mut self.stream, self.token, self.interest)
    }

    fn set_interest(&mut self, registry: &Registry, interest: Interest) -> std::io::Result<()> {
        if self.interest != interest {
            registry.reregister(&mut self.stream, self.token, interest)?;
            self.interest = interest;
        }
        Ok(())
    }

    /// Subscribes to write readiness; one-shot, the servicing paths disarm
    /// it again as their first action.
    pub(crate) fn arm_writable(&mut self, registry: &Registry) -> std::io::Result<()> {
        self.set_interest(registry, Interest::READABLE.add(Interest::WRITABLE))
    }

    pub(crate) fn disarm_writable(&mut self, registry: &Registry) -> std::io::Result<()> {
        self.set_interest(registry, Interest::READABLE)
    }
}
