//! Built-in middlewares.

mod logger;
mod recovery;

pub use logger::{Logger, logger};
pub use recovery::{Recovery, recovery};
