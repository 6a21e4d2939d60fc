#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, file: TestFile) -> Self {
        Self { name, file }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A raw request captured from a client, stored with bare `\n` line endings.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    content: &'static str,
}

impl TestFile {
    pub const fn new(content: &'static str) -> Self {
        Self { content }
    }

    /// The request as it goes over the wire, with `\r\n` line endings.
    pub fn wire_content(&self) -> String {
        self.content.replace('\n', "\r\n")
    }
}

/// Route table shared by the router benchmarks: `(pattern, request path)`.
pub const ROUTES: &[(&str, &str)] = &[
    ("/", "/"),
    ("/hello", "/hello"),
    ("/hello/:name", "/hello/ferris"),
    ("/hello/b/c", "/hello/b/c"),
    ("/hi/:name/profile", "/hi/ferris/profile"),
    ("/v1/users/:id/posts/:post", "/v1/users/42/posts/7"),
    ("/v2/login", "/v2/login"),
    ("/assets/*filepath", "/assets/css/deep/nested/site.css"),
];
