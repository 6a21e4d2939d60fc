//! The HTTP/1.1 transport underneath the switchyard dispatch engine
//!
//! This crate accepts bytes from a socket, decodes them into `http::Request<Bytes>`,
//! hands each request to a [`handler::Handler`] and writes the produced response back.
//! It knows nothing about routing: the dispatch engine plugs in as the handler.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use http_body_util::Full;
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use switchyard_http::connection::HttpConnection;
//! use switchyard_http::handler::make_handler;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!("service has error, cause {}, connection shutdown", e);
//!             }
//!             info!("finished process, connection shutdown");
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<Full<Bytes>>, Infallible> {
//!     info!(path = request.uri().path(), "request received");
//!     Ok(Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from_static(b"Hello World!\r\n"))).unwrap())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the per-connection request/response loop
//! - [`codec`]: request decoding and response encoding on top of `tokio_util::codec`
//! - [`protocol`]: request header wrapper and error types
//! - [`handler`]: the request handler trait
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Request bodies must be framed by `Content-Length`; chunked requests are rejected
//! - Request and response bodies are buffered in memory
//! - Maximum header size: 8KB, maximum number of headers: 64, maximum body size: 4MB

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
