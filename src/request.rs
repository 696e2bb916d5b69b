//! Incoming HTTP request type.
//!
//! The request is also the request-scoped context: anything a middleware
//! needs to hand to the code after it travels in the request's typed
//! extensions. One request, one set of extensions. Nothing is shared between
//! requests.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, Method};
use tracing::warn;

/// An incoming HTTP request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// A bodiless request, mostly for driving a [`Router`](crate::Router)
    /// in-process via [`Router::handle`](crate::Router::handle).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let headers = parts.headers.iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str().to_owned(), value.to_owned())),
                Err(_) => {
                    warn!(header = %name, "dropping non-UTF-8 request header");
                    None
                }
            })
            .collect();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the request-scoped value stored under the type `T`.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Stores a request-scoped value under its type, returning the previous one.
    pub fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Caller(&'static str);

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("X-Roles", "admin");
        assert_eq!(req.header("x-roles"), Some("admin"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn non_utf8_headers_are_dropped() {
        let (parts, ()) = http::Request::builder()
            .uri("/upload")
            .header("x-roles", "admin")
            .header("x-blob", http::HeaderValue::from_bytes(b"caf\xe9").unwrap())
            .body(())
            .unwrap()
            .into_parts();

        let req = Request::from_parts(parts, Bytes::new());
        assert_eq!(req.header("x-roles"), Some("admin"));
        assert_eq!(req.header("x-blob"), None);
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.path(), "/upload");
    }

    #[test]
    fn extensions_are_keyed_by_type() {
        let mut req = Request::new(Method::GET, "/");
        assert_eq!(req.extension::<Caller>(), None);

        assert_eq!(req.insert_extension(Caller("alice")), None);
        assert_eq!(req.insert_extension(Caller("bob")), Some(Caller("alice")));
        assert_eq!(req.extension::<Caller>(), Some(&Caller("bob")));
        assert_eq!(req.extension::<u32>(), None);
    }
}
