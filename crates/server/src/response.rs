//! Minimal http status and file responses
//!
//! Formats the fixed `HTTP/1.0` wire shape this core speaks: a status line,
//! the server identification header, a content type, optional caller-supplied
//! raw headers, and `Content-Length` framing. No chunked transfer and no
//! keep-alive: a file response closes the connection when it completes.
//!
//! Reason phrases come from two fixed tables covering [400, 418) and
//! [500, 506); any other code formats with an empty phrase and never fails.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use bytes::BytesMut;
use tracing::{debug, error};

use crate::connection::{Connection, FileCursor, HttpState};
use crate::handler::ServiceScope;

/// Value of the `Server:` response header.
pub const SERVER_NAME: &str = "micro-server";

/// Fragment size for streamed file responses.
const FILE_FRAGMENT_SIZE: usize = 4096;

const ERR400: [&str; 18] = [
    "Bad Request",
    "Unauthorized",
    "Payment Required",
    "Forbidden",
    "Not Found",
    "Method Not Allowed",
    "Not Acceptable",
    "Proxy Auth Required",
    "Request Timeout",
    "Conflict",
    "Gone",
    "Length Required",
    "Precondition Failed",
    "Request Entity Too Large",
    "Request URI too Long",
    "Unsupported Media Type",
    "Requested Range Not Satisfiable",
    "Expectation Failed",
];

const ERR500: [&str; 6] = [
    "Internal Server Error",
    "Not Implemented",
    "Bad Gateway",
    "Service Unavailable",
    "Gateway Timeout",
    "HTTP Version Not Supported",
];

/// How a file response left the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Something went wrong; close the connection now. A 404 status response
    /// was already attempted when the failure was a missing file.
    Error,
    /// Streaming started; leave the connection alone, more fragments follow
    /// on write readiness.
    Streaming,
    /// The entire file was issued; close the connection.
    Completed,
}

/// Reason phrase for `code`, or the empty string outside the known ranges.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        400..=417 => ERR400[usize::from(code - 400)],
        500..=505 => ERR500[usize::from(code - 500)],
        _ => "",
    }
}

/// Formats a minimal status response into `buf`, returning the byte count.
///
/// Unknown codes still produce a syntactically valid response with an empty
/// reason phrase; this never fails.
pub fn format_status(buf: &mut BytesMut, code: u16, html_body: Option<&str>) -> usize {
    buf.clear();
    let reason = reason_phrase(code);
    let body = html_body.unwrap_or("");
    // formatting into BytesMut cannot fail
    let _ = write!(
        buf,
        "HTTP/1.0 {code} {reason}\r\nServer: {SERVER_NAME}\r\nContent-Type: text/html\r\n\r\n<h1>{code} {reason}</h1>{body}"
    );
    buf.len()
}

impl ServiceScope<'_> {
    /// Reports a simple http status back to the client.
    ///
    /// Returns the byte count issued; an error means the response could not
    /// be written or queued and the caller should close the connection.
    pub fn return_http_status(&mut self, conn: &mut Connection, code: u16, html_body: Option<&str>) -> io::Result<usize> {
        let n = format_status(self.fmt_buf, code, html_body);
        debug!(code, len = n, "returning http status");
        conn.issue_raw(self.registry, &self.fmt_buf[..n])?;
        Ok(n)
    }

    /// Issues a local file down the http connection in a single step.
    ///
    /// Intended to be called from a handler callback in response to an http
    /// request. A file that cannot be opened sends a 404 status as a side
    /// effect and reports [`ServeOutcome::Error`]. Otherwise the headers
    /// (with `Content-Length` computed from the file size and any
    /// caller-supplied raw headers verbatim) are written, the connection
    /// enters the file-issuing sub-state, and the first fragments are
    /// attempted immediately. [`ServeOutcome::Completed`] means everything
    /// fit and the connection should be closed, [`ServeOutcome::Streaming`]
    /// means more service is needed later.
    pub fn serve_http_file(
        &mut self,
        conn: &mut Connection,
        path: &Path,
        content_type: &str,
        other_headers: Option<&[u8]>,
    ) -> ServeOutcome {
        let source = match self.opener.open(path) {
            Ok(source) => source,
            Err(e) => {
                error!(path = %path.display(), cause = %e, "unable to open file");
                let _ = self.return_http_status(conn, 404, None);
                return ServeOutcome::Error;
            }
        };
        let length = source.size();

        self.fmt_buf.clear();
        let _ = write!(self.fmt_buf, "HTTP/1.0 200 OK\r\nServer: {SERVER_NAME}\r\nContent-Type: {content_type}\r\n");
        if let Some(headers) = other_headers {
            self.fmt_buf.extend_from_slice(headers);
        }
        let _ = write!(self.fmt_buf, "Content-Length: {length}\r\n\r\n");

        let header_len = self.fmt_buf.len();
        if let Err(e) = conn.issue_raw(self.registry, &self.fmt_buf[..header_len]) {
            error!(cause = %e, "failed to write file response headers");
            return ServeOutcome::Error;
        }

        conn.set_http_state(HttpState::IssuingFile(FileCursor { source, length, sent: 0 }));
        self.serve_file_fragment(conn)
    }

    /// Streams file fragments until the socket pushes back or the file ends.
    ///
    /// Invoked from `serve_http_file` for the initial burst and from the
    /// dispatcher on later write-readiness events.
    pub(crate) fn serve_file_fragment(&mut self, conn: &mut Connection) -> ServeOutcome {
        loop {
            if conn.has_pending_write() {
                return match conn.arm_writable(self.registry) {
                    Ok(()) => ServeOutcome::Streaming,
                    Err(_) => ServeOutcome::Error,
                };
            }

            self.fmt_buf.clear();
            self.fmt_buf.resize(FILE_FRAGMENT_SIZE, 0);
            let n = {
                let HttpState::IssuingFile(cursor) = conn.http_state_mut() else {
                    return ServeOutcome::Error;
                };
                if cursor.sent >= cursor.length {
                    return ServeOutcome::Completed;
                }
                match cursor.source.read_fragment(&mut self.fmt_buf[..]) {
                    // the file shrank underneath us
                    Ok(0) => return ServeOutcome::Error,
                    Ok(n) => {
                        cursor.sent += n as u64;
                        n
                    }
                    Err(e) => {
                        error!(cause = %e, "file fragment read failed");
                        return ServeOutcome::Error;
                    }
                }
            };

            if let Err(e) = conn.issue_raw(self.registry, &self.fmt_buf[..n]) {
                error!(cause = %e, "file fragment write failed");
                return ServeOutcome::Error;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileio::StdFileOpener;
    use mio::{Poll, Token};
    use std::io::Read;

    fn connected_pair(poll: &Poll) -> (Connection, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (accepted, peer_addr) = listener.accept().unwrap();
        accepted.set_nonblocking(true).unwrap();

        let stream = mio::net::TcpStream::from_std(accepted);
        let mut conn = Connection::new(stream, peer_addr, Token(9));
        conn.register(poll.registry()).unwrap();
        (conn, client)
    }

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_format_status_404_is_bit_exact() {
        let mut buf = BytesMut::new();
        let n = format_status(&mut buf, 404, None);
        let expected =
            "HTTP/1.0 404 Not Found\r\nServer: micro-server\r\nContent-Type: text/html\r\n\r\n<h1>404 Not Found</h1>";
        assert_eq!(&buf[..n], expected.as_bytes());
    }

    #[test]
    fn test_format_status_unknown_code_has_empty_phrase() {
        let mut buf = BytesMut::new();
        let n = format_status(&mut buf, 599, None);
        let expected = "HTTP/1.0 599 \r\nServer: micro-server\r\nContent-Type: text/html\r\n\r\n<h1>599 </h1>";
        assert_eq!(&buf[..n], expected.as_bytes());
    }

    #[test]
    fn test_format_status_appends_body() {
        let mut buf = BytesMut::new();
        let n = format_status(&mut buf, 500, Some("try later"));
        assert!(buf[..n].ends_with(b"<h1>500 Internal Server Error</h1>try later"));
    }

    #[test]
    fn test_reason_phrase_range_edges() {
        assert_eq!(reason_phrase(400), "Bad Request");
        assert_eq!(reason_phrase(417), "Expectation Failed");
        assert_eq!(reason_phrase(418), "");
        assert_eq!(reason_phrase(500), "Internal Server Error");
        assert_eq!(reason_phrase(505), "HTTP Version Not Supported");
        assert_eq!(reason_phrase(506), "");
        assert_eq!(reason_phrase(200), "");
    }

    #[test]
    fn test_serve_empty_file_completes_with_zero_length() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll);
        let path = temp_file("micro_server_resp_empty.html", b"");

        let mut fmt_buf = BytesMut::new();
        let mut scope = ServiceScope { registry: poll.registry(), fmt_buf: &mut fmt_buf, opener: &StdFileOpener };
        let outcome = scope.serve_http_file(&mut conn, &path, "text/html", None);
        assert_eq!(outcome, ServeOutcome::Completed);

        drop(conn);
        let mut got = Vec::new();
        client.read_to_end(&mut got).unwrap();
        let expected =
            "HTTP/1.0 200 OK\r\nServer: micro-server\r\nContent-Type: text/html\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(got, expected.as_bytes());
    }

    #[test]
    fn test_serve_small_file_streams_body() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll);
        let path = temp_file("micro_server_resp_body.html", b"<p>hi</p>");

        let mut fmt_buf = BytesMut::new();
        let mut scope = ServiceScope { registry: poll.registry(), fmt_buf: &mut fmt_buf, opener: &StdFileOpener };
        let outcome = scope.serve_http_file(&mut conn, &path, "text/html", Some(b"X-Extra: 1\r\n"));
        assert_eq!(outcome, ServeOutcome::Completed);

        drop(conn);
        let mut got = Vec::new();
        client.read_to_end(&mut got).unwrap();
        let expected = "HTTP/1.0 200 OK\r\nServer: micro-server\r\nContent-Type: text/html\r\nX-Extra: 1\r\nContent-Length: 9\r\n\r\n<p>hi</p>";
        assert_eq!(got, expected.as_bytes());
    }

    #[test]
    fn test_serve_missing_file_sends_404() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll);

        let mut fmt_buf = BytesMut::new();
        let mut scope = ServiceScope { registry: poll.registry(), fmt_buf: &mut fmt_buf, opener: &StdFileOpener };
        let outcome = scope.serve_http_file(&mut conn, Path::new("/no/such/file.html"), "text/html", None);
        assert_eq!(outcome, ServeOutcome::Error);

        drop(conn);
        let mut got = Vec::new();
        client.read_to_end(&mut got).unwrap();
        let expected =
            "HTTP/1.0 404 Not Found\r\nServer: micro-server\r\nContent-Type: text/html\r\n\r\n<h1>404 Not Found</h1>";
        assert_eq!(got, expected.as_bytes());
    }

    #[test]
    fn test_return_http_status_reports_byte_count() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = connected_pair(&poll);

        let mut fmt_buf = BytesMut::new();
        let mut scope = ServiceScope { registry: poll.registry(), fmt_buf: &mut fmt_buf, opener: &StdFileOpener };
        let n = scope.return_http_status(&mut conn, 503, None).unwrap();

        drop(conn);
        let mut got = Vec::new();
        client.read_to_end(&mut got).unwrap();
        assert_eq!(got.len(), n);
        assert!(got.starts_with(b"HTTP/1.0 503 Service Unavailable\r\n"));
    }
}
