//! A small site showing routes, groups, middlewares and panic recovery.
//!
//! ```text
//! curl http://127.0.0.1:9999/hello/ferris
//! curl http://127.0.0.1:9999/assets/css/site.css
//! curl -d "username=geektutu&password=1234" http://127.0.0.1:9999/login
//! curl -d "username=admin" http://127.0.0.1:9999/admin/dashboard
//! curl http://127.0.0.1:9999/panic
//! ```

use futures::future::BoxFuture;
use http::StatusCode;
use serde_json::json;
use switchyard::{Context, Engine, EngineError, handler_fn};
use tracing::info;

fn index(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        ctx.html(StatusCode::OK, "<h1>Hello Switchyard</h1>");
    })
}

fn hello(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let body = format!("hello {}, you're at {}\n", ctx.param("name"), ctx.path());
        ctx.string(StatusCode::OK, body);
    })
}

fn login(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let body = json!({
            "username": ctx.post_form("username"),
            "password": ctx.post_form("password"),
        });
        ctx.json(StatusCode::OK, &body);
    })
}

fn assets(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let body = json!({ "filepath": ctx.param("filepath") });
        ctx.json(StatusCode::OK, &body);
    })
}

fn only_admin(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        if ctx.post_form("username") != "admin" {
            info!(path = ctx.path(), "rejected non admin user");
            ctx.auth_fail();
            ctx.abort();
            return;
        }
        ctx.set("user", "admin".to_owned());
    })
}

fn dashboard(ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let body = format!("welcome back, {}\n", ctx.get_string("user"));
        ctx.string(StatusCode::OK, body);
    })
}

fn boom(_ctx: &mut Context) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let names = vec!["geektutu"];
        println!("{}", names[100]);
    })
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let engine = Engine::with_defaults();

    engine
        .get("/", handler_fn(index))?
        .get("/hello/:name", handler_fn(hello))?
        .get("/assets/*filepath", handler_fn(assets))?
        .post("/login", handler_fn(login))?
        .get("/panic", handler_fn(boom))?;

    let admin = engine.group("/admin");
    admin.use_middleware(handler_fn(only_admin));
    admin.post("/dashboard", handler_fn(dashboard))?;

    engine.run("127.0.0.1:9999").await
}
