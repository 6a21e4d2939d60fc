//! Decoder for request bodies framed by a Content-Length header, as defined in
//! [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112.html#name-content-length).

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::protocol::ParseError;

/// Buffers a body of known length and yields it once complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes the body must contain
    length: usize,
}

impl LengthDecoder {
    /// Creates a decoder for a body of `length` bytes.
    ///
    /// The header decoder caps `length` well below `usize::MAX`, so the
    /// saturating conversion never truncates in practice.
    pub fn new(length: u64) -> Self {
        Self { length: usize::try_from(length).unwrap_or(usize::MAX) }
    }
}

impl Decoder for LengthDecoder {
    type Item = Bytes;
    type Error = ParseError;

    /// Returns `Ok(None)` until `length` bytes are buffered, then splits
    /// exactly that many bytes off `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(Bytes::new()));
        }

        if src.len() < self.length {
            src.reserve(self.length - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(self.length).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let bytes = length_decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(&bytes[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");
    }

    #[test]
    fn waits_for_the_whole_body() {
        let mut buffer = BytesMut::from(&b"12345"[..]);
        let mut length_decoder = LengthDecoder::new(8);

        assert!(length_decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"678");
        let bytes = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&bytes[..], b"12345678");
        assert!(buffer.is_empty());
    }

    #[test]
    fn zero_length_is_immediately_empty() {
        let mut buffer = BytesMut::from(&b"GET / HTTP/1.1"[..]);
        let bytes = LengthDecoder::new(0).decode(&mut buffer).unwrap().unwrap();
        assert!(bytes.is_empty());
        assert_eq!(buffer.len(), 14);
    }
}
