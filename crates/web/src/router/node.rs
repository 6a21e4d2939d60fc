//! The per-method prefix tree.
//!
//! Each node stands for one path segment. A segment starting with `:` matches any
//! single request segment, a segment starting with `*` matches all remaining ones.
//! A node whose `pattern` is non-empty ends a registered route.

/// Splits a route pattern into its segments, dropping empty ones.
///
/// Parsing stops after the first wildcard segment, so `/p/*name/*` yields `["p", "*name"]`.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for item in pattern.split('/').filter(|item| !item.is_empty()) {
        parts.push(item);
        if item.starts_with('*') {
            break;
        }
    }
    parts
}

/// Splits a request path into its segments, dropping empty ones.
///
/// Unlike [`parse_pattern`] nothing is special here: a literal `*` in a request
/// path is just another segment.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|item| !item.is_empty()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    segment: String,
    is_wild: bool,
    children: Vec<Node>,
    pattern: String,
}

impl Node {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_owned(),
            is_wild: segment.starts_with([':', '*']),
            children: Vec::new(),
            pattern: String::new(),
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn is_wild(&self) -> bool {
        self.is_wild
    }

    /// The full registered pattern, empty unless a route ends here.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_terminal(&self) -> bool {
        !self.pattern.is_empty()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Walks (creating as needed) one node per segment of `parts` and marks the
    /// last one with `pattern`.
    ///
    /// Children are matched by exact segment text, so `:id` and `:name` at the same
    /// depth are distinct siblings kept in registration order.
    ///
    /// Returns the already stored pattern, leaving the node untouched, when another
    /// pattern (e.g. `/a/b/` vs `/a/b`) already ends at the same node.
    pub fn insert(&mut self, pattern: &str, parts: &[&str], depth: usize) -> Option<String> {
        let Some(part) = parts.get(depth) else {
            if self.is_terminal() {
                return Some(self.pattern.clone());
            }
            self.pattern = pattern.to_owned();
            return None;
        };

        let index = match self.children.iter().position(|child| child.segment == *part) {
            Some(index) => index,
            None => {
                self.children.push(Node::new(part));
                self.children.len() - 1
            }
        };

        self.children[index].insert(pattern, parts, depth + 1)
    }

    /// Depth-first match of request segments against the tree.
    ///
    /// Once the input is consumed, or a wildcard node is reached, the node only
    /// counts if a route ends there. Otherwise every child equal to the current
    /// segment, or wild, is tried in registration order and the first terminal
    /// match wins.
    pub fn search(&self, parts: &[&str], depth: usize) -> Option<&Node> {
        let Some(part) = parts.get(depth).filter(|_| !self.segment.starts_with('*')) else {
            return self.is_terminal().then_some(self);
        };

        self.children
            .iter()
            .filter(|child| child.segment == *part || child.is_wild)
            .find_map(|child| child.search(parts, depth + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(patterns: &[&str]) -> Node {
        let mut root = Node::default();
        for pattern in patterns {
            assert!(root.insert(pattern, &parse_pattern(pattern), 0).is_none());
        }
        root
    }

    fn find<'a>(root: &'a Node, path: &str) -> Option<&'a str> {
        root.search(&split_path(path), 0).map(Node::pattern)
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!(parse_pattern("/p/:name"), vec!["p", ":name"]);
        assert_eq!(parse_pattern("/p/*"), vec!["p", "*"]);
        assert_eq!(parse_pattern("/p/*name/*"), vec!["p", "*name"]);
        assert!(parse_pattern("/").is_empty());
        assert_eq!(parse_pattern("//a///b/"), vec!["a", "b"]);
    }

    #[test]
    fn wild_flag_follows_sigil() {
        assert!(Node::new(":name").is_wild());
        assert!(Node::new("*path").is_wild());
        assert!(!Node::new("name").is_wild());
    }

    #[test]
    fn only_route_ends_carry_a_pattern() {
        let root = tree(&["/hello/b/c"]);

        let hello = &root.children()[0];
        let b = &hello.children()[0];
        let c = &b.children()[0];

        assert!(!root.is_terminal());
        assert!(!hello.is_terminal());
        assert!(!b.is_terminal());
        assert_eq!(c.pattern(), "/hello/b/c");
    }

    #[test]
    fn prefix_of_a_route_is_not_a_match() {
        let root = tree(&["/hello/b/c", "/assets/*filepath"]);

        assert_eq!(find(&root, "/hello/b"), None);
        assert_eq!(find(&root, "/assets"), None);
        assert_eq!(find(&root, "/hello/b/c"), Some("/hello/b/c"));
    }

    #[test]
    fn root_route_matches_empty_path() {
        let root = tree(&["/", "/hello"]);
        assert_eq!(find(&root, "/"), Some("/"));
        assert_eq!(find(&root, ""), Some("/"));
    }

    #[test]
    fn wildcard_short_circuits() {
        let root = tree(&["/assets/*filepath"]);
        assert_eq!(find(&root, "/assets/a.txt"), Some("/assets/*filepath"));
        assert_eq!(find(&root, "/assets/css/deep/a.css"), Some("/assets/*filepath"));
    }

    #[test]
    fn search_backtracks_into_later_siblings() {
        let root = tree(&["/hello/:name/profile", "/hello/b/c"]);

        assert_eq!(find(&root, "/hello/b/c"), Some("/hello/b/c"));
        assert_eq!(find(&root, "/hello/b/profile"), Some("/hello/:name/profile"));
        assert_eq!(find(&root, "/hello/x/c"), None);
    }

    #[test]
    fn literal_and_param_siblings_resolve_by_registration_order() {
        let param_first = tree(&["/users/:id", "/users/me"]);
        assert_eq!(find(&param_first, "/users/me"), Some("/users/:id"));

        let literal_first = tree(&["/users/me", "/users/:id"]);
        assert_eq!(find(&literal_first, "/users/me"), Some("/users/me"));
        assert_eq!(find(&literal_first, "/users/42"), Some("/users/:id"));
    }

    #[test]
    fn insert_reports_equivalent_pattern() {
        let mut root = tree(&["/a/b"]);
        assert_eq!(root.insert("/a/b/", &parse_pattern("/a/b/"), 0), Some("/a/b".to_owned()));
        assert_eq!(find(&root, "/a/b"), Some("/a/b"));
    }
}
