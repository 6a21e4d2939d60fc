//! Route groups: a path prefix plus the middlewares applied under it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use http::Method;

use crate::error::RouteError;
use crate::handler::Handler;
use crate::router::Router;

/// State shared by an engine and every group derived from it while routes are
/// being registered.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    router: Mutex<Router>,
    groups: Mutex<Vec<Arc<GroupState>>>,
}

impl Registry {
    pub(crate) fn router(&self) -> MutexGuard<'_, Router> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn groups(&self) -> MutexGuard<'_, Vec<Arc<GroupState>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct GroupState {
    prefix: String,
    middlewares: Mutex<Vec<Arc<dyn Handler>>>,
    parent: Option<Weak<GroupState>>,
}

impl std::fmt::Debug for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupState")
            .field("prefix", &self.prefix)
            .field("middlewares", &self.middlewares().len())
            .finish_non_exhaustive()
    }
}

impl GroupState {
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn middlewares(&self) -> MutexGuard<'_, Vec<Arc<dyn Handler>>> {
        self.middlewares.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A set of routes sharing a path prefix and middlewares.
///
/// Groups are cheap handles: cloning one yields another handle to the same group.
/// Prefixes concatenate, so `/v1` grouped again with `/admin` registers routes
/// under `/v1/admin`.
#[derive(Debug, Clone)]
pub struct RouterGroup {
    state: Arc<GroupState>,
    registry: Arc<Registry>,
}

macro_rules! method_routes {
    ($($(#[$doc:meta])* $name:ident => $method:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(&self, comp: &str, handler: impl Handler) -> Result<&Self, RouteError> {
                self.handle(Method::$method, comp, handler)
            }
        )*
    };
}

impl RouterGroup {
    pub(crate) fn root(registry: Arc<Registry>) -> Self {
        let state = Arc::new(GroupState { prefix: String::new(), middlewares: Mutex::default(), parent: None });
        registry.groups().push(Arc::clone(&state));
        Self { state, registry }
    }

    pub fn prefix(&self) -> &str {
        &self.state.prefix
    }

    /// The group this one was derived from, `None` for an engine's root group.
    pub fn parent(&self) -> Option<RouterGroup> {
        let parent = self.state.parent.as_ref()?.upgrade()?;
        Some(RouterGroup { state: parent, registry: Arc::clone(&self.registry) })
    }

    /// Creates a child group under `prefix`, appended to this group's prefix.
    pub fn group(&self, prefix: &str) -> RouterGroup {
        let state = Arc::new(GroupState {
            prefix: format!("{}{}", self.state.prefix, prefix),
            middlewares: Mutex::default(),
            parent: Some(Arc::downgrade(&self.state)),
        });
        self.registry.groups().push(Arc::clone(&state));
        RouterGroup { state, registry: Arc::clone(&self.registry) }
    }

    /// Appends a middleware that runs for every request whose path starts with
    /// this group's prefix.
    pub fn use_middleware(&self, middleware: impl Handler) -> &Self {
        self.state.middlewares().push(Arc::new(middleware));
        self
    }

    /// Registers `handler` for `method` at this group's prefix followed by `comp`.
    pub fn handle(&self, method: Method, comp: &str, handler: impl Handler) -> Result<&Self, RouteError> {
        let pattern = format!("{}{}", self.state.prefix, comp);
        self.registry.router().add_route(method, &pattern, Arc::new(handler))?;
        Ok(self)
    }

    method_routes! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }
}
