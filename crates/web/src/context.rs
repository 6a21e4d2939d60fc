//! Per-request state shared along the handler chain.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use mime::Mime;
use once_cell::sync::OnceCell;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{BoxError, ContextError, ErrorKind};
use crate::handler::Handler;
use crate::response::ResponseWriter;
use crate::router::Params;

/// Chain position that no handler list can reach; set by [`Context::abort`].
const ABORT_INDEX: isize = isize::MAX / 2;

type Pairs = Vec<(String, String)>;

/// Everything one request carries through its handler chain: the request, the
/// response being built, path parameters, a key/value store and attached errors.
///
/// A context is owned by exactly one request and dropped once the response is
/// handed back to the connection.
pub struct Context {
    request: Request<Bytes>,
    writer: ResponseWriter,
    method: Method,
    path: String,
    params: Params,

    handlers: Vec<Arc<dyn Handler>>,
    index: isize,

    keys: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    errors: Vec<ContextError>,

    query_cache: OnceCell<Pairs>,
    form_cache: OnceCell<Pairs>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("index", &self.index)
            .field("handlers", &self.handlers.len())
            .field("status", &self.writer.status())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(request: Request<Bytes>, writer: ResponseWriter) -> Self {
        Self {
            method: request.method().clone(),
            path: decode_path(request.uri().path()),
            request,
            writer,
            params: Params::new(),
            handlers: Vec::new(),
            index: -1,
            keys: RwLock::new(HashMap::new()),
            errors: Vec::new(),
            query_cache: OnceCell::new(),
            form_cache: OnceCell::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The percent-decoded request path, the one routes are matched against.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// A request header as text, `None` if absent or not visible ASCII.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.request.headers().get(key).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn into_response(self) -> Response<Bytes> {
        self.writer.into_response()
    }

    // ---- handler chain ----

    pub(crate) fn set_handlers(&mut self, handlers: Vec<Arc<dyn Handler>>) {
        self.handlers = handlers;
    }

    pub(crate) fn push_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Runs the remaining handlers of the chain, in order.
    ///
    /// Each handler runs at most once per request: a nested `next` from a
    /// middleware moves the shared position forward, so the outer loop resumes
    /// after whatever the nested call already ran. Returns early once the chain is
    /// aborted.
    pub async fn next(&mut self) {
        self.index += 1;
        while let Some(handler) = self.current_handler() {
            handler.call(self).await;
            self.index += 1;
        }
    }

    fn current_handler(&self) -> Option<Arc<dyn Handler>> {
        let index = usize::try_from(self.index).ok()?;
        self.handlers.get(index).map(Arc::clone)
    }

    /// Stops the chain: no handler after the current one will run. Handlers
    /// already suspended in `next` still finish their own code.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.status(code);
        self.abort();
    }

    pub fn abort_with_status_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        self.abort();
        self.json(code, value);
    }

    /// Aborts with `code`, attaches `err` and returns the attached error.
    pub fn abort_with_error(&mut self, code: StatusCode, err: impl Into<BoxError>) -> &ContextError {
        self.abort_with_status(code);
        self.error(err)
    }

    // ---- errors ----

    /// Attaches an error to the request, see [`ContextError::from_boxed`].
    pub fn error(&mut self, err: impl Into<BoxError>) -> &ContextError {
        let index = self.errors.len();
        self.errors.push(ContextError::from_boxed(err.into()));
        &self.errors[index]
    }

    pub fn errors(&self) -> &[ContextError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&ContextError> {
        self.errors.last()
    }

    // ---- inputs ----

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A path parameter of the matched route, empty if the route has none by that name.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).unwrap_or_default()
    }

    /// A query string value, empty if absent.
    pub fn query(&self, key: &str) -> &str {
        lookup(self.query_pairs(), key).unwrap_or_default()
    }

    pub fn get_query(&self, key: &str) -> Option<&str> {
        lookup(self.query_pairs(), key)
    }

    /// A form value, looking at an urlencoded request body first and the query
    /// string second. Empty if absent.
    pub fn post_form(&self, key: &str) -> &str {
        lookup(self.form_pairs(), key).or_else(|| lookup(self.query_pairs(), key)).unwrap_or_default()
    }

    fn query_pairs(&self) -> &Pairs {
        self.query_cache.get_or_init(|| {
            let query = self.request.uri().query().unwrap_or_default();
            serde_urlencoded::from_str(query).unwrap_or_else(|e| {
                debug!(query, "ignore malformed query string, cause: {}", e);
                Vec::new()
            })
        })
    }

    fn form_pairs(&self) -> &Pairs {
        self.form_cache.get_or_init(|| {
            if !self.has_content_type(&mime::APPLICATION_WWW_FORM_URLENCODED) {
                return Vec::new();
            }
            serde_urlencoded::from_bytes(self.request.body()).unwrap_or_else(|e| {
                debug!("ignore malformed form body, cause: {}", e);
                Vec::new()
            })
        })
    }

    fn has_content_type(&self, expected: &Mime) -> bool {
        self.header(CONTENT_TYPE.as_str())
            .and_then(|value| value.parse::<Mime>().ok())
            .is_some_and(|mime| mime.essence_str() == expected.essence_str())
    }

    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        serde_json::from_slice(self.request.body()).map_err(|e| ContextError::new(ErrorKind::Bind, e))
    }

    pub fn bind_form<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        serde_urlencoded::from_bytes(self.request.body()).map_err(|e| ContextError::new(ErrorKind::Bind, e))
    }

    /// Binds the query string; nested keys such as `filter[name]=x` are supported.
    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        let query = self.request.uri().query().unwrap_or_default();
        serde_qs::from_str(query).map_err(|e| ContextError::new(ErrorKind::Bind, e))
    }

    // ---- key/value store ----

    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, `None` if absent or stored with another type.
    pub fn get<V: Any + Clone>(&self, key: &str) -> Option<V> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(key).and_then(|value| value.downcast_ref::<V>()).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get::<String>(key)
            .or_else(|| self.get::<&'static str>(key).map(str::to_owned))
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).unwrap_or_default()
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get(key).unwrap_or_default()
    }

    pub fn get_u64(&self, key: &str) -> u64 {
        self.get(key).unwrap_or_default()
    }

    pub fn get_f64(&self, key: &str) -> f64 {
        self.get(key).unwrap_or_default()
    }

    // ---- outputs ----

    pub fn status(&mut self, code: StatusCode) {
        self.writer.write_header(code);
    }

    /// The response status, as the writer will send it.
    pub fn status_code(&self) -> StatusCode {
        self.writer.status()
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.writer.set_header(key, value);
    }

    pub fn string(&mut self, code: StatusCode, text: impl AsRef<str>) {
        self.set_content_type(&mime::TEXT_PLAIN_UTF_8);
        self.status(code);
        self.writer.write(text.as_ref().as_bytes());
    }

    /// Writes `value` as JSON. A value that cannot be encoded yields a
    /// `500 Internal Server Error` and an attached [`ErrorKind::Render`] error.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_content_type(&mime::APPLICATION_JSON);
                self.status(code);
                self.writer.write(&body);
            }
            Err(e) => {
                error!(path = %self.path, "encode json response error, cause: {}", e);
                self.errors.push(ContextError::new(ErrorKind::Render, e));
                self.fail();
            }
        }
    }

    pub fn html(&mut self, code: StatusCode, html: impl AsRef<str>) {
        self.set_content_type(&mime::TEXT_HTML_UTF_8);
        self.status(code);
        self.writer.write(html.as_ref().as_bytes());
    }

    pub fn data(&mut self, code: StatusCode, data: impl AsRef<[u8]>) {
        self.set_content_type(&mime::APPLICATION_OCTET_STREAM);
        self.status(code);
        self.writer.write(data.as_ref());
    }

    pub fn fail(&mut self) {
        self.string(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    }

    pub fn auth_fail(&mut self) {
        self.string(StatusCode::FORBIDDEN, "Forbidden, Auth Fail");
    }

    fn set_content_type(&mut self, content_type: &Mime) {
        self.writer.set_header(CONTENT_TYPE, content_type.as_ref());
    }
}

/// Percent-decodes a request path, keeping it raw when the bytes are not UTF-8.
fn decode_path(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(e) => {
            debug!(path = raw, "keep path undecoded, cause: {}", e);
            raw.to_owned()
        }
    }
}

fn lookup<'a>(pairs: &'a Pairs, key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use serde::Deserialize;
    use serde_json::json;

    fn context(method: Method, uri: &str, content_type: Option<&str>, body: &'static str) -> Context {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        Context::new(builder.body(Bytes::from_static(body.as_bytes())).unwrap(), ResponseWriter::new())
    }

    fn get(uri: &str) -> Context {
        context(Method::GET, uri, None, "")
    }

    fn recording(name: &'static str) -> Arc<dyn Handler> {
        Arc::new(handler_fn(move |ctx| {
            Box::pin(async move {
                let mut trace = ctx.get_string("trace");
                trace.push_str(name);
                ctx.set("trace", trace);
            })
        }))
    }

    #[tokio::test]
    async fn next_runs_each_handler_once_in_order() {
        let wrapping: Arc<dyn Handler> = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                let mut trace = ctx.get_string("trace");
                trace.push('(');
                ctx.set("trace", trace);

                ctx.next().await;

                let mut trace = ctx.get_string("trace");
                trace.push(')');
                ctx.set("trace", trace);
            })
        }));

        let mut ctx = get("/");
        ctx.set_handlers(vec![recording("a"), wrapping, recording("b"), recording("c")]);
        ctx.next().await;

        assert_eq!(ctx.get_string("trace"), "a(bc)");
    }

    #[tokio::test]
    async fn abort_stops_later_handlers() {
        let stop: Arc<dyn Handler> = Arc::new(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.abort_with_status(StatusCode::UNAUTHORIZED);
                ctx.set("finished", true);
            })
        }));

        let mut ctx = get("/");
        ctx.set_handlers(vec![recording("a"), stop, recording("b")]);
        ctx.next().await;

        assert!(ctx.is_aborted());
        assert_eq!(ctx.get_string("trace"), "a");
        assert!(ctx.get_bool("finished"));
        assert_eq!(ctx.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_chain_is_a_noop() {
        let mut ctx = get("/");
        ctx.next().await;
        assert_eq!(ctx.handler_count(), 0);
        assert!(!ctx.writer().written());
    }

    #[test]
    fn query_values() {
        let ctx = get("/search?q=rust+lang&page=2&q=ignored");
        assert_eq!(ctx.query("q"), "rust lang");
        assert_eq!(ctx.query("page"), "2");
        assert_eq!(ctx.query("missing"), "");
        assert_eq!(ctx.get_query("missing"), None);
    }

    #[test]
    fn form_values_prefer_body() {
        let ctx = context(
            Method::POST,
            "/login?username=from-query&lang=en",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "username=geektutu&password=1234",
        );
        assert_eq!(ctx.post_form("username"), "geektutu");
        assert_eq!(ctx.post_form("password"), "1234");
        assert_eq!(ctx.post_form("lang"), "en");
        assert_eq!(ctx.post_form("missing"), "");
    }

    #[test]
    fn form_body_needs_form_content_type() {
        let ctx = context(Method::POST, "/login", Some("text/plain"), "username=geektutu");
        assert_eq!(ctx.post_form("username"), "");
    }

    #[test]
    fn missing_param_is_empty() {
        let mut ctx = get("/hello/ferris");
        let mut params = Params::new();
        params.insert("name", "ferris");
        ctx.set_params(params);

        assert_eq!(ctx.param("name"), "ferris");
        assert_eq!(ctx.param("id"), "");
    }

    #[test]
    fn key_value_store() {
        let ctx = get("/");
        ctx.set("user", "ferris".to_owned());
        ctx.set("admin", true);
        ctx.set("visits", 3_i64);

        assert_eq!(ctx.get::<String>("user").as_deref(), Some("ferris"));
        assert_eq!(ctx.get_string("user"), "ferris");
        assert!(ctx.get_bool("admin"));
        assert_eq!(ctx.get_i64("visits"), 3);
        assert!(ctx.contains_key("visits"));

        assert_eq!(ctx.get::<u32>("visits"), None);
        assert_eq!(ctx.get::<String>("nobody"), None);
        assert_eq!(ctx.get_u64("nobody"), 0);

        ctx.set("user", "crab");
        assert_eq!(ctx.get_string("user"), "crab");
    }

    #[test]
    fn key_value_store_is_shared_across_threads() {
        let ctx = get("/");

        std::thread::scope(|scope| {
            for worker in 0..4_i64 {
                let ctx = &ctx;
                scope.spawn(move || {
                    for round in 0..100_i64 {
                        let key = format!("worker{worker}-{round}");
                        ctx.set(key.as_str(), worker * 1000 + round);
                        assert_eq!(ctx.get_i64(&key), worker * 1000 + round);
                        assert!(ctx.contains_key(&format!("worker{worker}-0")));
                    }
                });
            }
        });

        for worker in 0..4_i64 {
            for round in 0..100_i64 {
                assert_eq!(ctx.get_i64(&format!("worker{worker}-{round}")), worker * 1000 + round);
            }
        }
    }

    #[test]
    fn path_is_percent_decoded() {
        assert_eq!(get("/hello/caf%C3%A9%20x?q=%20").path(), "/hello/café x");
        assert_eq!(get("/plain/path").path(), "/plain/path");
        assert_eq!(get("/bad/%FF%FE").path(), "/bad/%FF%FE");
    }

    #[test]
    fn string_sets_content_type_and_status() {
        let mut ctx = get("/");
        ctx.string(StatusCode::CREATED, "made");

        assert_eq!(ctx.status_code(), StatusCode::CREATED);
        let response = ctx.into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body().as_ref(), b"made");
    }

    #[test]
    fn json_output() {
        let mut ctx = get("/");
        ctx.json(StatusCode::OK, &json!({ "username": "ferris" }));

        let response = ctx.into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body().as_ref(), br#"{"username":"ferris"}"#);
    }

    #[test]
    fn unencodable_json_becomes_500() {
        let mut map = HashMap::new();
        map.insert(vec![1_u8], "keys must be strings");

        let mut ctx = get("/");
        ctx.json(StatusCode::OK, &map);

        assert_eq!(ctx.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.errors()[0].is_kind(ErrorKind::Render));
        assert_eq!(ctx.into_response().body().as_ref(), b"Internal Server Error");
    }

    #[test]
    fn html_and_data_outputs() {
        let mut ctx = get("/");
        ctx.html(StatusCode::OK, "<h1>hi</h1>");
        assert_eq!(ctx.into_response().headers()[CONTENT_TYPE], "text/html; charset=utf-8");

        let mut ctx = get("/");
        ctx.data(StatusCode::OK, [0_u8, 1, 2]);
        let response = ctx.into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(response.body().as_ref(), &[0_u8, 1, 2]);
    }

    #[test]
    fn status_after_commit_is_ignored() {
        let mut ctx = get("/");
        ctx.string(StatusCode::OK, "first");
        ctx.status(StatusCode::NOT_FOUND);
        ctx.string(StatusCode::BAD_REQUEST, " second");

        assert_eq!(ctx.status_code(), StatusCode::OK);
        assert_eq!(ctx.into_response().body().as_ref(), b"first second");
    }

    #[test]
    fn fail_helpers() {
        let mut ctx = get("/");
        ctx.auth_fail();
        assert_eq!(ctx.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ctx.into_response().body().as_ref(), b"Forbidden, Auth Fail");
    }

    #[test]
    fn abort_with_error_attaches_error() {
        let mut ctx = get("/");
        let kind = ctx.abort_with_error(StatusCode::BAD_REQUEST, "missing name").kind();

        assert_eq!(kind, ErrorKind::Private);
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.last_error().unwrap().to_string(), "missing name");
    }

    #[test]
    fn abort_with_status_json_writes_body() {
        let mut ctx = get("/");
        ctx.abort_with_status_json(StatusCode::UNPROCESSABLE_ENTITY, &json!({ "error": "bad" }));
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        username: String,
        password: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Filter {
        page: u32,
        tags: Vec<String>,
    }

    #[test]
    fn binding() {
        let ctx = context(Method::POST, "/", Some("application/json"), r#"{"username":"a","password":"b"}"#);
        assert_eq!(ctx.bind_json::<Login>().unwrap(), Login { username: "a".into(), password: "b".into() });

        let ctx = context(Method::POST, "/", None, "username=a&password=b");
        assert_eq!(ctx.bind_form::<Login>().unwrap(), Login { username: "a".into(), password: "b".into() });

        let ctx = get("/?page=2&tags[0]=x&tags[1]=y");
        assert_eq!(ctx.bind_query::<Filter>().unwrap(), Filter { page: 2, tags: vec!["x".into(), "y".into()] });

        let ctx = context(Method::POST, "/", None, "not json");
        assert!(ctx.bind_json::<Login>().unwrap_err().is_kind(ErrorKind::Bind));
    }
}
