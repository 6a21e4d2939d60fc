//! HTTP connection handling module
//!
//! [`HttpConnection`] owns one client socket for its whole life:
//!
//! - decodes requests as they arrive (pipelined requests are answered in order)
//! - hands each request to the [`Handler`](crate::handler::Handler)
//! - collects the response body and writes the response
//! - keeps the connection alive until EOF or `Connection: close`

mod http_connection;

pub use http_connection::HttpConnection;
