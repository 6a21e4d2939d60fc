//! Protocol types shared by the codec and the connection loop.
//!
//! - [`RequestHeader`]: a bodyless `http::Request` with keep-alive inspection
//! - [`HttpError`], [`ParseError`], [`SendError`]: transport errors

mod request;
pub use request::RequestHeader;
pub use request::is_keep_alive;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
