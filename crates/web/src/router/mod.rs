mod node;
mod params;

pub use node::{Node, parse_pattern};
pub use params::Params;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::RouteError;
use crate::handler::Handler;
use node::split_path;

/// Route table: one prefix tree per method plus the handler behind every pattern.
///
/// Every terminal node of a tree has an entry in `handlers` under its method and
/// pattern, and every entry was inserted into its method's tree.
#[derive(Clone)]
pub struct Router {
    roots: HashMap<Method, Node>,
    handlers: HashMap<(Method, String), Arc<dyn Handler>>,
    not_found: Arc<dyn Handler>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("roots", &self.roots).field("routes", &self.handlers.len()).finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { roots: HashMap::new(), handlers: HashMap::new(), not_found: Arc::new(NotFound) }
    }

    /// Registers `handler` for `method` requests matching `pattern`.
    ///
    /// Fails on a malformed pattern and on a pattern that is already registered for
    /// the method, either verbatim or in an equivalent spelling such as `/a/b/`
    /// for `/a/b` or `/a/:id` for `/a/:name`.
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), RouteError> {
        validate_pattern(pattern)?;

        let key = (method, pattern.to_owned());
        if self.handlers.contains_key(&key) {
            let (method, pattern) = key;
            return Err(RouteError::Conflict { method, existing: pattern.clone(), pattern });
        }

        let parts = parse_pattern(pattern);
        // same shape means same matched paths; the earlier route would always win
        let shadowing = self
            .handlers
            .keys()
            .find(|(registered, existing)| *registered == key.0 && same_shape(&parse_pattern(existing), &parts))
            .map(|(_, existing)| existing.clone());
        if let Some(existing) = shadowing {
            let (method, pattern) = key;
            return Err(RouteError::Conflict { method, pattern, existing });
        }

        let root = self.roots.entry(key.0.clone()).or_default();
        if let Some(existing) = root.insert(pattern, &parts, 0) {
            let (method, pattern) = key;
            return Err(RouteError::Conflict { method, pattern, existing });
        }

        info!("Route {:>7} - {}", key.0.as_str(), pattern);
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Finds the route for a request and the parameters it captures.
    ///
    /// `:name` segments bind the request segment at the same position, a named
    /// `*name` segment binds all remaining segments joined with `/`.
    pub fn get_route(&self, method: &Method, path: &str) -> Option<(&Node, Params)> {
        let search_parts = split_path(path);
        let node = self.roots.get(method)?.search(&search_parts, 0)?;

        let mut params = Params::new();
        for (index, part) in parse_pattern(node.pattern()).into_iter().enumerate() {
            if let Some(name) = part.strip_prefix(':') {
                if let Some(value) = search_parts.get(index) {
                    params.insert(name, *value);
                }
            } else if let Some(name) = part.strip_prefix('*') {
                if !name.is_empty() {
                    params.insert(name, search_parts.get(index..).unwrap_or_default().join("/"));
                }
                break;
            }
        }

        Some((node, params))
    }

    /// All nodes ending a route for `method`, in depth-first order.
    pub fn get_routes(&self, method: &Method) -> Vec<&Node> {
        fn collect<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
            if node.is_terminal() {
                out.push(node);
            }
            for child in node.children() {
                collect(child, out);
            }
        }

        let mut nodes = Vec::new();
        if let Some(root) = self.roots.get(method) {
            collect(root, &mut nodes);
        }
        nodes
    }

    /// Resolves the route of `ctx`, appends its handler (or the not-found handler)
    /// to the chain and runs the chain.
    pub async fn handle(&self, ctx: &mut Context) {
        let handler = match self.get_route(ctx.method(), ctx.path()) {
            Some((node, params)) => {
                let key = (ctx.method().clone(), node.pattern().to_owned());
                ctx.set_params(params);
                self.handlers.get(&key).map_or_else(|| Arc::clone(&self.not_found), Arc::clone)
            }
            None => {
                debug!(method = %ctx.method(), path = ctx.path(), "no route matched");
                Arc::clone(&self.not_found)
            }
        };

        ctx.push_handler(handler);
        ctx.next().await;
    }
}

fn validate_pattern(pattern: &str) -> Result<(), RouteError> {
    let mut segments = pattern.split('/').filter(|segment| !segment.is_empty());
    while let Some(segment) = segments.next() {
        if segment == ":" {
            return Err(RouteError::EmptyParamName { pattern: pattern.to_owned() });
        }
        if segment.starts_with('*') && segments.next().is_some() {
            return Err(RouteError::WildcardNotLast { pattern: pattern.to_owned() });
        }
    }
    Ok(())
}

/// Whether two parsed patterns match the same request paths, parameter names aside.
fn same_shape(a: &[&str], b: &[&str]) -> bool {
    fn shape(segment: &str) -> &str {
        match segment.as_bytes().first() {
            Some(b':') => ":",
            Some(b'*') => "*",
            _ => segment,
        }
    }

    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| shape(x) == shape(y))
}

#[derive(Debug)]
struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn call(&self, ctx: &mut Context) {
        let body = format!("404 NOT FOUND: {}\n", ctx.path());
        ctx.string(StatusCode::NOT_FOUND, body);
    }
}
