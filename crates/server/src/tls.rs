//! Non-blocking TLS accept handshake driver
//!
//! The handshake advances across repeated invocations, one per event-loop
//! wakeup: each call makes as much progress as the socket allows and then
//! reports whether the handshake completed, failed, or suspended waiting for
//! read or write readiness. The driver never blocks and is safe to re-invoke
//! any number of times; overall progress is bounded only by the external
//! timeout sweep.

use std::io;

use tracing::{debug, trace, warn};

use crate::connection::Connection;

/// Outcome of one handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeProgress {
    /// Handshake finished; the connection can serve http.
    Complete,
    /// Suspended until the socket is readable again.
    WantRead,
    /// Suspended until the socket is writable again.
    WantWrite,
    /// Unrecoverable; close and discard this connection.
    Failed,
}

/// Classifies the first unconsumed byte of a connection on a TLS port.
///
/// TLS records open with a non-printable content-type byte (0x14–0x17 for
/// ChangeCipherSpec through application data), while a cleartext http request
/// line opens with a printable ASCII method name. Any byte at or above 0x20
/// is therefore taken as cleartext. This is a documented best-effort
/// heuristic, not verification; the threshold is observable compatibility
/// behavior and must not change.
pub fn looks_like_cleartext(first: u8) -> bool {
    first >= 0x20
}

/// Peeks at the first byte without consuming it and applies
/// [`looks_like_cleartext`]. No byte available yet reads as "not cleartext";
/// the handshake attempt that follows will suspend on read readiness.
pub(crate) fn sniff_cleartext(conn: &mut Connection) -> io::Result<bool> {
    let mut first = [0u8; 1];
    match conn.stream.peek(&mut first) {
        Ok(n) if n >= 1 => Ok(looks_like_cleartext(first[0])),
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

/// Advances the accept handshake as far as the socket allows.
///
/// Pending handshake output is flushed before reading more input, mirroring
/// the session's own priorities; a connection without a TLS session reports
/// completion immediately.
pub(crate) fn advance_handshake(conn: &mut Connection) -> HandshakeProgress {
    let Some(session) = conn.tls.as_mut() else {
        return HandshakeProgress::Complete;
    };

    loop {
        while session.wants_write() {
            match session.write_tls(&mut conn.stream) {
                Ok(n) => trace!(len = n, "wrote handshake bytes"),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return HandshakeProgress::WantWrite,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(cause = %e, "handshake write failed");
                    return HandshakeProgress::Failed;
                }
            }
        }

        if !session.is_handshaking() {
            return HandshakeProgress::Complete;
        }

        match session.read_tls(&mut conn.stream) {
            Ok(0) => {
                debug!("peer closed during tls accept");
                return HandshakeProgress::Failed;
            }
            Ok(n) => trace!(len = n, "read handshake bytes"),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return HandshakeProgress::WantRead,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(cause = %e, "handshake read failed");
                return HandshakeProgress::Failed;
            }
        }

        if let Err(e) = session.process_new_packets() {
            warn!(cause = %e, "tls accept failed");
            // best-effort alert flush before the caller closes us
            let _ = session.write_tls(&mut conn.stream);
            return HandshakeProgress::Failed;
        }
    }
}
