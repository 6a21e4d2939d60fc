//! Error types of the dispatch engine.
//!
//! - [`RouteError`]: configuration mistakes caught while registering routes
//! - [`EngineError`]: failures while starting to serve
//! - [`ContextError`]: errors handlers attach to a request's [`Context`](crate::Context)

use std::error::Error;
use std::io;

use http::Method;
use serde_json::{Value, json};
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A route could not be registered.
///
/// These are programmer errors: they surface from the registration call itself,
/// never at request time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route conflict: {method} {pattern} collides with already registered {existing}")]
    Conflict { method: Method, pattern: String, existing: String },

    #[error("invalid pattern {pattern}: a wildcard segment must be the last segment")]
    WildcardNotLast { pattern: String },

    #[error("invalid pattern {pattern}: a parameter segment needs a name")]
    EmptyParamName { pattern: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    #[error("bind server error: {source}")]
    Bind {
        #[source]
        source: io::Error,
    },
}

/// How an error attached to a context should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// request data could not be bound to a type
    Bind,
    /// a response body could not be rendered
    Render,
    /// internal detail, not meant for clients
    Private,
    /// safe to show to clients
    Public,
}

/// An error attached to a request with [`Context::error`](crate::Context::error).
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ContextError {
    kind: ErrorKind,
    source: BoxError,
    meta: Option<Value>,
}

impl ContextError {
    pub fn new(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self { kind, source: source.into(), meta: None }
    }

    /// Wraps any error as a [`ErrorKind::Private`] one, keeping an existing
    /// `ContextError` (and its kind) as is.
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<ContextError>() {
            Ok(context_error) => *context_error,
            Err(other) => Self::new(ErrorKind::Private, other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    /// JSON view of the error: object metadata is merged in, anything else
    /// goes under `"meta"`.
    pub fn to_json(&self) -> Value {
        let mut body = match &self.meta {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(other) => json!({ "meta": other }),
            None => json!({}),
        };
        body["error"] = Value::String(self.source.to_string());
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_errors_become_private() {
        let err = ContextError::from_boxed(io::Error::other("disk on fire").into());
        assert_eq!(err.kind(), ErrorKind::Private);
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn context_errors_keep_their_kind() {
        let original = ContextError::new(ErrorKind::Public, "name is required");
        let err = ContextError::from_boxed(Box::new(original));
        assert!(err.is_kind(ErrorKind::Public));
    }

    #[test]
    fn json_view_merges_object_meta() {
        let err = ContextError::new(ErrorKind::Bind, "bad form").with_meta(json!({ "field": "username" }));
        assert_eq!(err.to_json(), json!({ "field": "username", "error": "bad form" }));

        let err = ContextError::new(ErrorKind::Bind, "bad form").with_meta(json!(42));
        assert_eq!(err.to_json(), json!({ "meta": 42, "error": "bad form" }));
    }
}
