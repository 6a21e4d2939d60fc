//! HTTP header decoder for parsing request heads
//!
//! Parsing is delegated to `httparse`; the parsed method, target, version and
//! fields are then copied into an owned `http::Request<()>`.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Shortest complete head we can possibly receive: "GET / HTTP/1.1\r\n\r\n"
const MIN_HEAD_BYTES: usize = 18;

/// Decoder for HTTP request heads.
///
/// Yields the parsed [`RequestHeader`] together with the declared body length.
/// The head bytes are consumed from `src`; body bytes are left in place.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, u64);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_HEAD_BYTES {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(&src[..]).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            // HTTP/2 and HTTP/3 are not spoken here
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let method = req.method.and_then(|m| Method::from_bytes(m.as_bytes()).ok()).ok_or(ParseError::InvalidMethod)?;
        let uri = req.path.and_then(|p| p.parse::<Uri>().ok()).ok_or(ParseError::InvalidUri)?;

        let mut header_map = HeaderMap::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = header_map;

        let header = RequestHeader::from(request);
        let content_length = header.content_length()?;

        src.advance(body_offset);
        Ok(Some((header, content_length)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(raw: &str) -> Result<Option<(RequestHeader, u64)>, ParseError> {
        let mut buf = BytesMut::from(raw.replace('\n', "\r\n").as_bytes());
        HeaderDecoder.decode(&mut buf)
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html?name=ferris HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let (header, length) = decode(str).unwrap().unwrap();

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), Some("name=ferris"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::ACCEPT), Some(&HeaderValue::from_static("*/*")));
        assert_eq!(length, 0);
    }

    #[test]
    fn head_only_consumes_head_bytes() {
        let raw = "POST /login HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut buf = BytesMut::from(raw.as_bytes());

        let (header, length) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(length, 5);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn partial_head_needs_more_data() {
        assert!(decode("GET /index.html HTTP/1.1\nHost: 127").unwrap().is_none());
    }

    #[test]
    fn oversized_partial_head_is_rejected() {
        let raw = format!("GET / HTTP/1.1\r\nX-Filler: {}", "a".repeat(MAX_HEADER_BYTES));
        let mut buf = BytesMut::from(raw.as_bytes());
        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn http_10_is_accepted() {
        let (header, _) = decode("GET / HTTP/1.0\nHost: a\n\n").unwrap().unwrap();
        assert_eq!(header.version(), Version::HTTP_10);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode("\u{1}\u{2}\u{3} / HTTP/1.1\nHost: a\n\n").is_err());
    }
}
