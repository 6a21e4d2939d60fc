//! HTTP response encoder
//!
//! Serializes a fully buffered `Response<Bytes>`: status line, headers with a
//! `Content-Length` matching the body, blank line, body.
//!
//! `1xx`, `204` and `304` responses go out without body and without
//! `Content-Length`. Answers to `HEAD` keep the `Content-Length` of the body they
//! would carry but leave the body out.

use crate::protocol::SendError;

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderValue, Response, StatusCode};
use tokio_util::codec::Encoder;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for buffered HTTP/1.1 responses.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    head_request: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the next responses as answers to `HEAD` requests.
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }
}

fn is_bodyless(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut parts, body) = item.into_parts();

        dst.reserve(INIT_HEADER_SIZE + body.len());

        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(parts.status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(parts.status.canonical_reason().unwrap_or("").as_bytes());
        dst.put_slice(b"\r\n");

        // the body is buffered, so the length is always known
        parts.headers.remove(TRANSFER_ENCODING);
        let bodyless = is_bodyless(parts.status);
        if bodyless {
            parts.headers.remove(CONTENT_LENGTH);
        } else {
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        for (header_name, header_value) in &parts.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        if !bodyless && !self.head_request {
            dst.put_slice(&body);
        }
        Ok(())
    }
}
