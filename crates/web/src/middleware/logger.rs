use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::Context;
use crate::handler::Handler;

/// See [`logger`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

/// Logs method, path, final status and latency of every request it wraps, plus
/// any errors handlers attached along the way.
pub fn logger() -> Logger {
    Logger
}

#[async_trait]
impl Handler for Logger {
    async fn call(&self, ctx: &mut Context) {
        let start = Instant::now();
        ctx.next().await;

        info!(
            method = %ctx.method(),
            path = ctx.path(),
            status = ctx.status_code().as_u16(),
            elapsed = ?start.elapsed(),
            "request finished"
        );
        for err in ctx.errors() {
            warn!(path = ctx.path(), kind = ?err.kind(), "request error: {}", err);
        }
    }
}
