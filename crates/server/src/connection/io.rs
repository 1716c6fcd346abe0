//! Unified plain/TLS socket I/O for a connection.
//!
//! All operations are non-blocking: `WouldBlock` becomes either a quiet
//! return ([`ReadOutcome::WouldBlock`]) or a stashed pending write with
//! write-readiness re-armed, never a blocking call or an error.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};
use mio::Registry;
use tracing::trace;

use super::Connection;

/// Result of one read attempt against the shared service buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// `n` bytes landed in the buffer.
    Data(usize),
    /// Orderly peer close (zero-length read / TLS close_notify).
    Closed,
    /// Nothing available now; resume on the next readiness event.
    WouldBlock,
}

impl Connection {
    /// Performs the one read of this event-loop turn into `buf`.
    ///
    /// For TLS connections this pulls ciphertext off the socket, decrypts,
    /// and hands back available plaintext; the three-way outcome is the same
    /// for both transports.
    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.tls.as_mut() {
            Some(tls) => {
                match tls.read_tls(&mut self.stream) {
                    Ok(0) => return Ok(ReadOutcome::Closed),
                    Ok(n) => trace!(len = n, "read ciphertext"),
                    // buffered plaintext from an earlier record may remain
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }

                tls.process_new_packets().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                match tls.reader().read(buf) {
                    Ok(0) => Ok(ReadOutcome::Closed),
                    Ok(n) => Ok(ReadOutcome::Data(n)),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
                    Err(e) => Err(e),
                }
            }
            None => match self.stream.read(buf) {
                Ok(0) => Ok(ReadOutcome::Closed),
                Ok(n) => Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadOutcome::WouldBlock),
                Err(e) => Err(e),
            },
        }
    }

    /// Writes `data` down the transport, queuing any truncated remainder.
    ///
    /// Must not be called while a pending write exists; the servicing paths
    /// guarantee that by draining first. A partial kernel write stashes the
    /// unsent tail and arms write readiness, so the logical write always
    /// either fully succeeds (`Ok(data.len())`) or fails hard.
    pub(crate) fn issue_raw(&mut self, registry: &Registry, data: &[u8]) -> io::Result<usize> {
        debug_assert!(!self.has_pending_write(), "new write issued while one is outstanding");

        match self.tls.as_mut() {
            Some(tls) => {
                // plaintext is buffered by the session, then flushed as far
                // as the socket allows
                tls.writer().write_all(data)?;
            }
            None => {
                let mut written = 0;
                while written < data.len() {
                    match self.stream.write(&data[written..]) {
                        Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                        Ok(n) => written += n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            trace!(queued = data.len() - written, "truncated send, queuing remainder");
                            self.set_pending(Bytes::copy_from_slice(&data[written..]));
                            break;
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.flush_pending(registry)?;
        Ok(data.len())
    }

    /// Retries a previously truncated write as far as the socket allows,
    /// re-arming write readiness if anything is still left over.
    pub(crate) fn flush_pending(&mut self, registry: &Registry) -> io::Result<()> {
        let mut rearm = false;

        if let Some(tls) = self.tls.as_mut() {
            while tls.wants_write() {
                match tls.write_tls(&mut self.stream) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        rearm = true;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        } else {
            while let Some(mut buf) = self.take_pending() {
                match self.stream.write(&buf) {
                    Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                    Ok(n) => {
                        buf.advance(n);
                        if !buf.is_empty() {
                            self.set_pending(buf);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        self.set_pending(buf);
                        rearm = true;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                        self.set_pending(buf);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if rearm {
            self.arm_writable(registry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::{Poll, Token};
    use std::net::SocketAddr;

    /// Connected non-blocking pair: a mio stream registered with `poll` and
    /// the peer's blocking std stream.
    fn connected_pair(poll: &Poll, token: Token) -> (Connection, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (accepted, peer_addr) = listener.accept().unwrap();
        accepted.set_nonblocking(true).unwrap();

        let stream = mio::net::TcpStream::from_std(accepted);
        let mut conn = Connection::new(stream, peer_addr, token);
        conn.register(poll.registry()).unwrap();
        (conn, client)
    }

    #[test]
    fn test_read_into_reports_peer_data() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll, Token(7));

        std::io::Write::write_all(&mut client, b"GET / HTTP/1.0\r\n").unwrap();
        // give loopback delivery a moment
        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut buf = [0u8; 64];
        match conn.read_into(&mut buf).unwrap() {
            ReadOutcome::Data(n) => assert_eq!(&buf[..n], b"GET / HTTP/1.0\r\n"),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn test_read_into_without_data_would_block() {
        let poll = Poll::new().unwrap();
        let (mut conn, _client) = connected_pair(&poll, Token(7));

        let mut buf = [0u8; 64];
        assert_eq!(conn.read_into(&mut buf).unwrap(), ReadOutcome::WouldBlock);
    }

    #[test]
    fn test_read_into_reports_orderly_close() {
        let poll = Poll::new().unwrap();
        let (mut conn, client) = connected_pair(&poll, Token(7));

        drop(client);
        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut buf = [0u8; 64];
        assert_eq!(conn.read_into(&mut buf).unwrap(), ReadOutcome::Closed);
    }

    #[test]
    fn test_issue_raw_small_write_leaves_no_pending() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll, Token(7));

        let n = conn.issue_raw(poll.registry(), b"hello").unwrap();
        assert_eq!(n, 5);
        assert!(!conn.has_pending_write());

        let mut got = [0u8; 5];
        std::io::Read::read_exact(&mut client, &mut got).unwrap();
        assert_eq!(&got, b"hello");
    }

    #[test]
    fn test_truncated_send_queues_and_drains() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll, Token(7));

        // flood the socket until the kernel buffer refuses more, so a
        // truncated remainder gets queued
        let chunk = vec![0x42u8; 1 << 20];
        let mut rounds = 0;
        while !conn.has_pending_write() {
            conn.issue_raw(poll.registry(), &chunk).unwrap();
            rounds += 1;
            assert!(rounds < 64, "kernel buffer never filled");
        }
        let queued = conn.pending_len();
        assert!(queued > 0);

        // drain the peer, then flushing should eventually clear the queue
        let mut sink = vec![0u8; 1 << 20];
        let mut attempts = 0;
        while conn.has_pending_write() {
            std::io::Read::read(&mut client, &mut sink).unwrap();
            conn.flush_pending(poll.registry()).unwrap();
            attempts += 1;
            assert!(attempts < 1024, "pending write never drained");
        }
        assert_eq!(conn.pending_len(), 0);
    }

    #[test]
    fn test_timeout_arm_and_clear() {
        let poll = Poll::new().unwrap();
        let (mut conn, _client) = connected_pair(&poll, Token(7));

        assert!(conn.timeout().is_none());
        conn.set_timeout(super::super::TimeoutReason::TlsAccept, std::time::Duration::from_secs(5));
        let armed = conn.timeout().unwrap();
        assert_eq!(armed.reason, super::super::TimeoutReason::TlsAccept);
        assert!(armed.deadline > std::time::Instant::now());

        conn.clear_timeout();
        assert!(conn.timeout().is_none());
    }

    #[test]
    fn test_peer_addr_is_reported() {
        let poll = Poll::new().unwrap();
        let (conn, client) = connected_pair(&poll, Token(7));
        let expected: SocketAddr = client.local_addr().unwrap();
        assert_eq!(conn.peer_addr(), expected);
    }
}
