//! Request body decoding for `Content-Length` framed payloads.

mod length_decoder;

pub use length_decoder::LengthDecoder;
