//! Turns a panic in the rest of the handler chain into a `500` response.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use pin_project_lite::pin_project;
use tracing::error;

use crate::context::Context;
use crate::handler::Handler;

thread_local! {
    /// How many guarded futures are being polled on this thread right now.
    static RECOVERING: Cell<usize> = const { Cell::new(0) };

    /// Backtrace of the last panic raised while guarded.
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// See [`recovery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

/// Recovers from panics raised by later handlers of the same request.
///
/// The panic message and a backtrace are logged at error level, the client gets
/// `500 Internal Server Error` (unless output was already written) and the chain is
/// aborted. The connection and every other request are unaffected.
///
/// Panics inside guarded handlers are not printed by the default panic hook;
/// any other panic still is.
pub fn recovery() -> Recovery {
    install_panic_hook();
    Recovery
}

#[async_trait]
impl Handler for Recovery {
    async fn call(&self, ctx: &mut Context) {
        install_panic_hook();

        let outcome = AssertUnwindSafe(Guarded { inner: ctx.next() }).catch_unwind().await;
        let Err(payload) = outcome else {
            return;
        };

        let message = panic_message(payload.as_ref());
        let backtrace = LAST_BACKTRACE.with(|slot| slot.borrow_mut().take());
        error!("{}\n\n", traceback(&message, backtrace.as_ref()));

        ctx.abort();
        if ctx.writer().written() {
            error!(path = ctx.path(), "panic after response was written, dropping further output");
            ctx.writer_mut().close();
        } else {
            ctx.fail();
        }
    }
}

fn install_panic_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECOVERING.with(Cell::get) > 0 {
                let backtrace = Backtrace::force_capture();
                LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn traceback(message: &str, backtrace: Option<&Backtrace>) -> String {
    match backtrace {
        Some(backtrace) => format!("{message}\nTraceback:\n{backtrace}"),
        None => format!("{message}\nTraceback: unavailable"),
    }
}

pin_project! {
    /// Marks the current thread as recovering while the inner future is polled.
    struct Guarded<F> {
        #[pin]
        inner: F,
    }
}

impl<F: Future> Future for Guarded<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let _scope = RecoveringScope::enter();
        self.project().inner.poll(cx)
    }
}

struct RecoveringScope;

impl RecoveringScope {
    fn enter() -> Self {
        RECOVERING.with(|depth| depth.set(depth.get() + 1));
        RecoveringScope
    }
}

impl Drop for RecoveringScope {
    fn drop(&mut self) {
        RECOVERING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 3));
        assert_eq!(panic_message(payload.as_ref()), "index 3 out of range");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn traceback_layout() {
        assert_eq!(traceback("boom", None), "boom\nTraceback: unavailable");
        let text = traceback("boom", Some(&Backtrace::force_capture()));
        assert!(text.starts_with("boom\nTraceback:\n"));
    }

    #[tokio::test]
    async fn guard_scope_tracks_polling() {
        assert_eq!(RECOVERING.with(Cell::get), 0);
        let depth = Guarded { inner: async { RECOVERING.with(Cell::get) } }.await;
        assert_eq!(depth, 1);
        assert_eq!(RECOVERING.with(Cell::get), 0);
    }
}
