//! HTTP request decoder module
//!
//! Decoding runs in two phases: the head is parsed by [`HeaderDecoder`], then the
//! body is collected by a [`LengthDecoder`] sized from the `Content-Length` header.
//! A request is only yielded once both phases are complete.

use crate::codec::body::LengthDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{ParseError, RequestHeader};
use bytes::{Bytes, BytesMut};
use http::Request;
use tokio_util::codec::Decoder;

/// A decoder for complete HTTP requests with buffered bodies
///
/// # State Machine
///
/// - `pending == None`: parsing the head
/// - `pending == Some(..)`: head parsed, waiting for body bytes
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    pending: Option<(RequestHeader, LengthDecoder)>,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// # Returns
    ///
    /// - `Ok(Some(request))`: a full request, body included
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the bytes are not a request we accept
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            match self.header_decoder.decode(src)? {
                Some((header, content_length)) => self.pending = Some((header, LengthDecoder::new(content_length))),
                None => return Ok(None),
            }
        }

        let body = match &mut self.pending {
            Some((_, body_decoder)) => body_decoder.decode(src)?,
            None => None,
        };

        Ok(body.and_then(|body| self.pending.take().map(|(header, _)| header.body(body))))
    }
}
