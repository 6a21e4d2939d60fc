//! HTTP codec module for decoding requests and encoding responses
//!
//! Both halves plug into `tokio_util::codec` so the connection loop can use
//! `FramedRead`/`FramedWrite`.
//!
//! - [`RequestDecoder`]: head via `httparse`, then a `Content-Length` framed body
//! - [`ResponseEncoder`]: status line, headers and a fully buffered body
//!
//! # Example
//!
//! ```no_run
//! use switchyard_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"[..]);
//! let request = decoder.decode(&mut buffer);
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
