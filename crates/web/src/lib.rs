//! An embeddable HTTP dispatch engine.
//!
//! Routes are kept in one prefix tree per method, supporting static segments,
//! `:name` parameters and a trailing `*name` wildcard. Route groups share a path
//! prefix and a list of middlewares; every request runs through the middlewares of
//! each group whose prefix starts its path, then through its route handler, all
//! sharing one [`Context`].
//!
//! ```no_run
//! use http::StatusCode;
//! use switchyard::{Engine, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::with_defaults();
//!     engine.get(
//!         "/hello/:name",
//!         handler_fn(|ctx| {
//!             Box::pin(async move {
//!                 let body = format!("hello {}\n", ctx.param("name"));
//!                 ctx.string(StatusCode::OK, body);
//!             })
//!         }),
//!     )?;
//!     engine.run("127.0.0.1:9999").await?;
//!     Ok(())
//! }
//! ```

mod context;
mod engine;
mod error;
mod group;
mod handler;
mod response;

pub mod middleware;
pub mod router;

pub use context::Context;
pub use engine::{Dispatcher, Engine};
pub use error::{BoxError, ContextError, EngineError, ErrorKind, RouteError};
pub use group::RouterGroup;
pub use handler::{FnHandler, Handler, handler_fn};
pub use response::ResponseWriter;
