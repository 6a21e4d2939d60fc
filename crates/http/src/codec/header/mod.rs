//! Request head decoding.
//!
//! [`HeaderDecoder`] turns the bytes up to the blank line into a [`RequestHeader`]
//! and reports how many body bytes follow it.
//!
//! [`RequestHeader`]: crate::protocol::RequestHeader

mod header_decoder;

pub use header_decoder::HeaderDecoder;
