//! Radix tree for HTTP route matching
//!
//! Paths are split into segments and stored in a tree where:
//! - Each node represents a path segment
//! - Static segments (e.g., `users`) match exactly and are tried first
//! - Parameter segments (`{id}` or `:id`) match any single segment
//! - Values are stored at terminal nodes, keyed by HTTP method
//!
//! Lookup is O(k) in the path length. When a static branch dead-ends the
//! search backtracks into parameter branches, so `/users/me` and
//! `/users/{id}/posts` can coexist.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::router::RadixRouter;
//! use http::Method;
//!
//! let mut router = RadixRouter::new();
//! router.insert(Method::GET, "/users/{id}", "get_user");
//!
//! let (value, params) = router.route(&Method::GET, "/users/123").unwrap();
//! assert_eq!(*value, "get_user");
//! assert_eq!(params[0].1, "123");
//! ```

use super::ParamVec;
use http::Method;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Parameter name of a template segment, if it is one.
#[must_use]
pub fn param_name(segment: &str) -> Option<&str> {
    if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
        Some(&segment[1..segment.len() - 1])
    } else if let Some(name) = segment.strip_prefix(':') {
        (!name.is_empty()).then_some(name)
    } else {
        None
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone)]
struct RadixNode<T> {
    /// The path segment this node represents (without leading /)
    segment: Cow<'static, str>,
    /// Values stored at this node per HTTP method
    routes: HashMap<Method, T>,
    /// Parameter name if this node is a parameter segment
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode<T>>,
    /// One child per distinct parameter name at this position
    param_children: Vec<RadixNode<T>>,
}

impl<T> RadixNode<T> {
    fn new(segment: Cow<'static, str>) -> Self {
        Self {
            segment,
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(name)),
            ..Self::new(Cow::Borrowed(""))
        }
    }

    /// Insert a value; returns the value it replaced for the same method.
    fn insert(&mut self, segments: &[&str], method: Method, value: T) -> Option<T> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, value);
        };

        if let Some(name) = param_name(segment) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(name))
            {
                return child.insert(remaining, method, value);
            }
            let mut child = RadixNode::new_param(name);
            let replaced = child.insert(remaining, method, value);
            self.param_children.push(child);
            return replaced;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == *segment) {
            return child.insert(remaining, method, value);
        }
        let mut child = RadixNode::new(Cow::Owned((*segment).to_string()));
        let replaced = child.insert(remaining, method, value);
        self.children.push(child);
        replaced
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<&T> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method);
        };

        for child in &self.children {
            if child.segment == *segment {
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
                params.pop();
            }
        }

        None
    }

    fn allowed(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((segment, remaining)) = segments.split_first() else {
            out.extend(self.routes.keys().cloned());
            return;
        };
        for child in self.children.iter().filter(|c| c.segment == *segment) {
            child.allowed(remaining, out);
        }
        for child in &self.param_children {
            child.allowed(remaining, out);
        }
    }
}

/// Radix tree keyed by path template and method.
#[derive(Clone)]
pub struct RadixRouter<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RadixRouter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(Cow::Borrowed("")),
            len: 0,
        }
    }

    /// Add a value for `method` and `path` template.
    ///
    /// # Returns
    ///
    /// The value previously stored for the same method and template, if any.
    pub fn insert(&mut self, method: Method, path: &str, value: T) -> Option<T> {
        let replaced = self.root.insert(&split_path(path), method, value);
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Match a request path.
    ///
    /// # Returns
    ///
    /// * `Some((value, params))` - The stored value with path parameters in path order
    /// * `None` - If no route matches the path and method
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<(&T, ParamVec)> {
        let segments = split_path(path);
        let mut params = ParamVec::new();
        let found = self.root.search(&segments, method, &mut params)?;
        Some((found, params))
    }

    /// Methods registered for any template matching `path`.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut out = Vec::new();
        self.root.allowed(&split_path(path), &mut out);
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out.dedup();
        out
    }

    /// Number of (method, template) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
        params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_radix_router_simple_route() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/health", "health_check");
        let (value, params) = router.route(&Method::GET, "/health").unwrap();
        assert_eq!(*value, "health_check");
        assert!(params.is_empty());
    }

    #[test]
    fn test_radix_router_multiple_parameters() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/{user_id}/posts/{post_id}", "get_post");
        let (value, params) = router.route(&Method::GET, "/users/123/posts/456").unwrap();
        assert_eq!(*value, "get_post");
        assert_eq!(param(&params, "user_id"), Some("123"));
        assert_eq!(param(&params, "post_id"), Some("456"));
    }

    #[test]
    fn test_radix_router_colon_segments() {
        let mut router = RadixRouter::new();
        router.insert(Method::DELETE, "/users/:id", "delete_user");
        let (_, params) = router.route(&Method::DELETE, "/users/9").unwrap();
        assert_eq!(param(&params, "id"), Some("9"));
    }

    #[test]
    fn test_radix_router_method_filtering() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/items", "get_items");
        router.insert(Method::POST, "/items", "create_item");
        assert_eq!(*router.route(&Method::POST, "/items").unwrap().0, "create_item");
        assert!(router.route(&Method::PUT, "/items").is_none());
        assert_eq!(router.allowed_methods("/items"), vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_radix_router_static_preferred_with_backtracking() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/me", "me");
        router.insert(Method::GET, "/users/{id}/posts", "posts");
        assert_eq!(*router.route(&Method::GET, "/users/me").unwrap().0, "me");
        let (value, params) = router.route(&Method::GET, "/users/me/posts").unwrap();
        assert_eq!(*value, "posts");
        assert_eq!(param(&params, "id"), Some("me"));
    }

    #[test]
    fn test_radix_router_different_param_names_same_position() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/{user_id}/posts", "get_user_posts");
        router.insert(Method::GET, "/users/{id}/comments", "get_user_comments");

        let (_, params1) = router.route(&Method::GET, "/users/123/posts").unwrap();
        assert_eq!(param(&params1, "user_id"), Some("123"));
        assert!(param(&params1, "id").is_none());

        let (_, params2) = router.route(&Method::GET, "/users/456/comments").unwrap();
        assert_eq!(param(&params2, "id"), Some("456"));
        assert!(param(&params2, "user_id").is_none());
    }

    #[test]
    fn test_insert_replaces_same_method_and_template() {
        let mut router = RadixRouter::new();
        assert!(router.insert(Method::GET, "/a", 1).is_none());
        assert_eq!(router.insert(Method::GET, "/a", 2), Some(1));
        assert_eq!(router.len(), 1);
    }
}
