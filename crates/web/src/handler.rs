use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::Context;

/// One step of a request's handler chain: a middleware or a route handler.
///
/// A middleware that wants to run code after the rest of the chain calls
/// [`Context::next`] and awaits it; one that simply returns lets the chain continue
/// with the following handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: &mut Context);
}

#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn call(&self, ctx: &mut Context) {
        self.as_ref().call(ctx).await;
    }
}

/// a closure holder, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Turns a closure into a [`Handler`].
///
/// ```
/// use switchyard::handler_fn;
/// use http::StatusCode;
///
/// let hello = handler_fn(|ctx| {
///     Box::pin(async move {
///         let name = ctx.param("name").to_owned();
///         ctx.string(StatusCode::OK, format!("hello {name}"));
///     })
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut Context) {
        (self.f)(ctx).await;
    }
}
