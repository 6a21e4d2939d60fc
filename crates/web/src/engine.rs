use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use switchyard_http::connection::HttpConnection;
use switchyard_http::handler::Handler as HttpHandler;
use tokio::net::TcpListener;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::context::Context;
use crate::error::EngineError;
use crate::group::{Registry, RouterGroup};
use crate::handler::Handler;
use crate::middleware::{logger, recovery};
use crate::response::ResponseWriter;
use crate::router::Router;

/// The root of an application: a [`RouterGroup`] with an empty prefix that owns
/// the route table and every group derived from it.
///
/// Register routes and middlewares through the group methods (the engine derefs to
/// its root group), then [`run`](Self::run) it, or [`freeze`](Self::freeze) it into
/// a [`Dispatcher`] to drive requests by hand.
#[derive(Debug)]
pub struct Engine {
    root: RouterGroup,
    registry: Arc<Registry>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Engine {
    type Target = RouterGroup;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl Engine {
    /// An engine without middlewares.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::default());
        Self { root: RouterGroup::root(Arc::clone(&registry)), registry }
    }

    /// An engine with [`logger`] and [`recovery`] installed globally.
    pub fn with_defaults() -> Self {
        let engine = Self::new();
        engine.use_middleware(logger()).use_middleware(recovery());
        engine
    }

    /// Snapshots routes and group middlewares into an immutable [`Dispatcher`].
    ///
    /// Registrations made after this call are not seen by the returned dispatcher.
    pub fn freeze(&self) -> Dispatcher {
        let router = self.registry.router().clone();
        let groups = self
            .registry
            .groups()
            .iter()
            .map(|group| GroupSnapshot { prefix: group.prefix().to_owned(), middlewares: group.middlewares().clone() })
            .collect();
        Dispatcher { router, groups }
    }

    /// Binds `address` and serves HTTP/1.1 on it until the process ends.
    ///
    /// Installs a global `tracing` subscriber at `INFO` unless one is already set.
    pub async fn run<A: ToSocketAddrs>(&self, address: A) -> Result<(), EngineError> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            debug!("keep existing subscriber, cause: {}", e);
        }

        let address = address
            .to_socket_addrs()
            .map_err(|e| EngineError::InvalidAddress { reason: e.to_string() })?
            .collect::<Vec<SocketAddr>>();
        if address.is_empty() {
            return Err(EngineError::InvalidAddress { reason: "resolved to no socket address".to_owned() });
        }

        info!("start listening at {:?}", address);
        let tcp_listener = TcpListener::bind(address.as_slice()).await.map_err(|source| EngineError::Bind { source })?;
        self.serve(tcp_listener).await
    }

    /// Serves connections accepted from `tcp_listener`, one task per connection.
    pub async fn serve(&self, tcp_listener: TcpListener) -> Result<(), EngineError> {
        let dispatcher = Arc::new(self.freeze());
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(dispatcher).await {
                    Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(%remote_addr, "service has error, cause {}, connection shutdown", e),
                }
            });
        }
    }
}

struct GroupSnapshot {
    prefix: String,
    middlewares: Vec<Arc<dyn Handler>>,
}

impl std::fmt::Debug for GroupSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupSnapshot")
            .field("prefix", &self.prefix)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// The request-time view of an [`Engine`]: routes and middlewares, read only.
#[derive(Debug)]
pub struct Dispatcher {
    router: Router,
    groups: Vec<GroupSnapshot>,
}

impl Dispatcher {
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Middlewares of every group whose prefix starts `path`, groups in creation
    /// order, each group's middlewares in registration order.
    pub fn middlewares_for(&self, path: &str) -> Vec<Arc<dyn Handler>> {
        self.groups
            .iter()
            .filter(|group| path.starts_with(group.prefix.as_str()))
            .flat_map(|group| group.middlewares.iter().map(Arc::clone))
            .collect()
    }

    /// Runs one request through its middlewares and route handler.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        let mut ctx = Context::new(request, ResponseWriter::new());
        let middlewares = self.middlewares_for(ctx.path());
        ctx.set_handlers(middlewares);
        self.router.handle(&mut ctx).await;
        ctx.into_response()
    }
}

#[async_trait]
impl HttpHandler for Dispatcher {
    type RespBody = Full<Bytes>;
    type Error = Infallible;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Self::RespBody>, Self::Error> {
        Ok(self.dispatch(req).await.map(Full::new))
    }
}
