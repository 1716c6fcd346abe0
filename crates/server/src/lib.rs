//! A poll-driven connection acceptance and TLS negotiation core
//!
//! This crate provides the server-side transport layer of a micro HTTP/WebSocket
//! server: listening-socket setup, non-blocking accept, the TLS accept handshake
//! (with cleartext fallback on the TLS port), truncated-send buffering, and
//! HTTP/1.0 error and file-streaming responses. Everything runs single-threaded
//! on one `mio` poll loop; operations that cannot progress register interest and
//! suspend instead of blocking.
//!
//! The http/websocket parser itself is external: it plugs in through the
//! [`handler::ServiceHandler`] trait and receives raw decrypted bytes, write
//! opportunities, and connection lifecycle notifications.
//!
//! # Features
//!
//! - Single-threaded, cooperative, non-blocking event loop built on `mio`
//! - TLS termination through `rustls`, driven incrementally across readiness
//!   events
//! - Optional cleartext fallback: a plain http request arriving on the TLS
//!   port is detected before any handshake byte is consumed and served in the
//!   clear
//! - At-most-one pending (truncated) write per connection with strict
//!   drain-before-new-output ordering
//! - Listener fairness: accepts are rationed so a busy listening socket cannot
//!   starve established connections
//! - Connection timeouts armed for an external reaping sweep
//! - HTTP/1.0 canned status responses and fragment-by-fragment file streaming
//!
//! # Example
//!
//! ```no_run
//! use micro_server::config::ServerConfig;
//! use micro_server::connection::Connection;
//! use micro_server::handler::{Disposition, ServiceHandler, ServiceScope};
//! use micro_server::server::ServerContext;
//! use tracing::{error, info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! struct StaticFiles;
//!
//! impl ServiceHandler for StaticFiles {
//!     fn on_bytes(&mut self, scope: &mut ServiceScope<'_>, conn: &mut Connection, _data: &[u8]) -> Disposition {
//!         // a real handler parses `data`; this one serves the same file to
//!         // every request and hangs up when the transfer finishes
//!         match scope.serve_http_file(conn, std::path::Path::new("index.html"), "text/html", None) {
//!             micro_server::response::ServeOutcome::Streaming => Disposition::Continue,
//!             _ => Disposition::Close,
//!         }
//!     }
//!
//!     fn on_writable(&mut self, _scope: &mut ServiceScope<'_>, _conn: &mut Connection) -> Disposition {
//!         Disposition::Continue
//!     }
//! }
//!
//! fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let config = ServerConfig::new().port(8080);
//!     let mut context = match ServerContext::new(config, StaticFiles) {
//!         Ok(context) => context,
//!         Err(e) => {
//!             error!(cause = %e, "server creation failed");
//!             return;
//!         }
//!     };
//!     info!(port = 8080, "start listening");
//!
//!     loop {
//!         if let Err(e) = context.service(None) {
//!             error!(cause = %e, "service error");
//!             return;
//!         }
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`server`]: the [`ServerContext`](server::ServerContext) poll loop and
//!   event dispatcher
//! - [`listener`]: listening-socket creation and single-accept servicing
//! - [`connection`]: per-connection state, modes, timeouts and unified
//!   plain/TLS socket I/O
//! - [`tls`]: the incremental accept handshake driver and the cleartext sniff
//! - [`handler`]: the [`ServiceHandler`](handler::ServiceHandler) seam the
//!   external parser implements
//! - [`response`]: HTTP/1.0 status formatting and file streaming helpers
//! - [`config`]: server and TLS configuration
//! - [`fileio`]: the file-access abstraction behind file responses

pub mod config;
pub mod connection;
pub mod error;
pub mod fileio;
pub mod handler;
pub mod listener;
pub mod response;
pub mod server;
pub mod tls;
