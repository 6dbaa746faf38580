//! Route trie
//!
//! Maps `(verb, path)` to a handler. Paths are split on `/` with empty
//! segments skipped, so `/api//posts/` and `api/posts` address the same node.
//! A `*` segment is stored as the wildcard child and matches exactly one
//! non-empty segment.
//!
//! Lookup precedence: at every depth the literal child is tried before the
//! wildcard child, backtracking into the wildcard branch when the literal
//! branch dead-ends.

use std::collections::HashMap;

use hyper::Method;

use super::descriptor::RedirectDescriptor;
use crate::error::BootError;

const WILDCARD: &str = "*";

struct Node<H> {
    literals: HashMap<String, Node<H>>,
    wildcard: Option<Box<Node<H>>>,
    handlers: HashMap<Method, H>,
    redirects: HashMap<Method, RedirectDescriptor>,
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Self {
            literals: HashMap::new(),
            wildcard: None,
            handlers: HashMap::new(),
            redirects: HashMap::new(),
        }
    }
}

impl<H> Node<H> {
    fn child_or_insert(&mut self, segment: &str) -> &mut Self {
        if segment == WILDCARD {
            self.wildcard.get_or_insert_with(Box::default)
        } else {
            self.literals.entry(segment.to_string()).or_default()
        }
    }

    fn child(&self, segment: &str) -> Option<&Self> {
        if segment == WILDCARD {
            self.wildcard.as_deref()
        } else {
            self.literals.get(segment)
        }
    }

    fn find(&self, verb: &Method, segments: &[&str]) -> Option<&H> {
        let Some((first, rest)) = segments.split_first() else {
            return self.handlers.get(verb);
        };

        self.literals
            .get(*first)
            .and_then(|child| child.find(verb, rest))
            .or_else(|| {
                self.wildcard
                    .as_deref()
                    .and_then(|child| child.find(verb, rest))
            })
    }
}

/// Split a path template or request path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Verb-scoped path trie, built once at boot and read-only afterwards
pub struct RouteTrie<H> {
    root: Node<H>,
    len: usize,
}

impl<H> Default for RouteTrie<H> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<H> RouteTrie<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handlers
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attach a handler to `(verb, path)`; a second handler for the same pair is rejected
    pub fn register(&mut self, verb: Method, path: &str, handler: H) -> Result<(), BootError> {
        let node = self.walk_or_insert(path);
        if node.handlers.contains_key(&verb) {
            return Err(BootError::DuplicateRoute {
                verb,
                path: path.to_string(),
            });
        }
        node.handlers.insert(verb, handler);
        self.len += 1;
        Ok(())
    }

    /// Find the handler for a request path. `None` means "route not found".
    pub fn lookup(&self, verb: &Method, path: &str) -> Option<&H> {
        self.root.find(verb, &segments(path))
    }

    /// Attach a redirect rule to `(verb, path)`, independent of any handler at that node
    pub fn register_redirect(
        &mut self,
        verb: Method,
        path: &str,
        redirect: RedirectDescriptor,
    ) -> Result<(), BootError> {
        let node = self.walk_or_insert(path);
        if node.redirects.contains_key(&verb) {
            return Err(BootError::DuplicateRoute {
                verb,
                path: path.to_string(),
            });
        }
        node.redirects.insert(verb, redirect);
        Ok(())
    }

    /// Exact segment walk: a request segment only follows the child stored under
    /// the same key, so `*` is matched literally here
    pub fn find_redirect(&self, verb: &Method, path: &str) -> Option<&RedirectDescriptor> {
        segments(path)
            .into_iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
            .and_then(|node| node.redirects.get(verb))
    }

    fn walk_or_insert(&mut self, path: &str) -> &mut Node<H> {
        segments(path)
            .into_iter()
            .fold(&mut self.root, |node, segment| node.child_or_insert(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    fn trie(routes: &[(Method, &str, &'static str)]) -> RouteTrie<&'static str> {
        let mut trie = RouteTrie::new();
        for (verb, path, handler) in routes {
            trie.register(verb.clone(), path, *handler).unwrap();
        }
        trie
    }

    #[test]
    fn test_lookup_returns_registered_handler() {
        let trie = trie(&[
            (Method::POST, "/api/posts/create", "create"),
            (Method::GET, "/api/posts/findAll", "find_all"),
            (Method::GET, "/api/posts", "index"),
        ]);

        assert_eq!(trie.lookup(&Method::POST, "/api/posts/create"), Some(&"create"));
        assert_eq!(trie.lookup(&Method::GET, "/api/posts/findAll"), Some(&"find_all"));
        assert_eq!(trie.lookup(&Method::GET, "/api/posts"), Some(&"index"));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_lookup_misses_on_diverging_prefix_and_verb() {
        let trie = trie(&[(Method::POST, "/api/posts/create", "create")]);

        assert_eq!(trie.lookup(&Method::POST, "/api/posts/update"), None);
        assert_eq!(trie.lookup(&Method::POST, "/api/posts"), None);
        assert_eq!(trie.lookup(&Method::POST, "/api/posts/create/extra"), None);
        assert_eq!(trie.lookup(&Method::GET, "/api/posts/create"), None);
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let trie = trie(&[(Method::GET, "/api/posts/", "index")]);

        assert_eq!(trie.lookup(&Method::GET, "api//posts"), Some(&"index"));
        assert_eq!(trie.lookup(&Method::GET, "/api/posts/"), Some(&"index"));
    }

    #[test]
    fn test_wildcard_matches_exactly_one_segment() {
        let trie = trie(&[(Method::GET, "/api/*/detail", "detail")]);

        assert_eq!(trie.lookup(&Method::GET, "/api/42/detail"), Some(&"detail"));
        assert_eq!(trie.lookup(&Method::GET, "/api/42/43/detail"), None);
        assert_eq!(trie.lookup(&Method::GET, "/api/detail"), None);
    }

    #[test]
    fn test_literal_wins_over_wildcard() {
        let trie = trie(&[
            (Method::GET, "/api/*/detail", "wildcard"),
            (Method::GET, "/api/latest/detail", "literal"),
        ]);

        assert_eq!(trie.lookup(&Method::GET, "/api/latest/detail"), Some(&"literal"));
        assert_eq!(trie.lookup(&Method::GET, "/api/7/detail"), Some(&"wildcard"));
    }

    #[test]
    fn test_backtracks_into_wildcard_branch() {
        let trie = trie(&[
            (Method::GET, "/api/latest/summary", "literal"),
            (Method::GET, "/api/*/detail", "wildcard"),
        ]);

        // The literal branch exists but has no `detail` child
        assert_eq!(trie.lookup(&Method::GET, "/api/latest/detail"), Some(&"wildcard"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut trie = trie(&[(Method::GET, "/api/posts", "first")]);

        let err = trie.register(Method::GET, "api/posts/", "second").unwrap_err();
        assert!(matches!(err, BootError::DuplicateRoute { verb, .. } if verb == Method::GET));
        assert!(trie.register(Method::POST, "/api/posts", "post").is_ok());
        assert_eq!(trie.lookup(&Method::GET, "/api/posts"), Some(&"first"));
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let trie = trie(&[(Method::GET, "/api/*/detail", "detail")]);

        let first = trie.lookup(&Method::GET, "/api/1/detail").unwrap();
        let second = trie.lookup(&Method::GET, "/api/1/detail").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_redirects_are_independent_of_handlers() {
        let mut trie = trie(&[(Method::GET, "/old", "old")]);
        trie.register_redirect(Method::GET, "/old", RedirectDescriptor::new("/new"))
            .unwrap();
        trie.register_redirect(
            Method::GET,
            "/legacy/*",
            RedirectDescriptor::with_status("/", StatusCode::MOVED_PERMANENTLY),
        )
        .unwrap();

        assert_eq!(trie.lookup(&Method::GET, "/old"), Some(&"old"));
        assert_eq!(trie.find_redirect(&Method::GET, "/old").unwrap().target(), "/new");
        assert_eq!(trie.find_redirect(&Method::POST, "/old"), None);

        // Redirect lookup does not treat `*` as a wildcard
        assert!(trie.find_redirect(&Method::GET, "/legacy/page").is_none());
        let exact = trie.find_redirect(&Method::GET, "/legacy/*").unwrap();
        assert_eq!(exact.status(), StatusCode::MOVED_PERMANENTLY);
        assert!(trie.lookup(&Method::GET, "/legacy/page").is_none());
    }
}
