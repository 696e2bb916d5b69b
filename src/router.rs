//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler. Controllers register through the same entry point via
//! [`apply_controller`](crate::apply_controller).

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::decorator::Route;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or drive it in-process with [`Router::handle`].
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    registered: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), registered: Vec::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or conflicts with an existing route.
    /// Use [`Router::try_on`] to handle that as an error instead.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.try_on(method, path, handler)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Fallible form of [`Router::on`].
    pub fn try_on(mut self, method: Method, path: &str, handler: impl Handler) -> Result<Self, Error> {
        self.insert(method, path, handler.into_boxed_handler())?;
        Ok(self)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub(crate) fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path, handler)
            .map_err(|source| Error::Route {
                method: method.clone(),
                path: path.to_owned(),
                source,
            })?;
        debug!(%method, path, "route registered");
        self.registered.push(Route { method, path: path.to_owned() });
        Ok(())
    }

    /// Every registration, in the order it was made.
    pub fn routes(&self) -> &[Route] {
        &self.registered
    }

    /// Dispatches one request in-process: the same path the server takes,
    /// minus the socket. Unmatched requests get `404 Not Found`.
    pub async fn handle(&self, mut req: Request) -> Response {
        match self.lookup(&req.method, &req.path) {
            Some((handler, params)) => {
                req.params = params;
                handler.call(req).await
            }
            None => Response::status(StatusCode::NOT_FOUND),
        }
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn show(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    #[tokio::test]
    async fn dispatches_with_params() {
        let router = Router::new().get("/users/{id}", show);
        let res = router.handle(Request::new(Method::GET, "/users/42")).await;
        assert_eq!(res.body(), b"user 42");
    }

    #[tokio::test]
    async fn unmatched_method_or_path_is_not_found() {
        let router = Router::new().get("/users/{id}", show);
        let wrong_method = router.handle(Request::new(Method::POST, "/users/42")).await;
        let wrong_path = router.handle(Request::new(Method::GET, "/orders")).await;
        assert_eq!(wrong_method.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(wrong_path.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflicting_route_is_an_error() {
        let router = Router::new().get("/users/{id}", show);
        let err = router.try_on(Method::GET, "/users/{id}", show).err().unwrap();
        assert!(matches!(err, Error::Route { ref path, .. } if path == "/users/{id}"));
    }

    #[test]
    fn routes_are_listed_in_registration_order() {
        let router = Router::new()
            .post("/users", show)
            .get("/users/{id}", show);
        let listed: Vec<_> = router.routes().iter()
            .map(|r| (r.method.clone(), r.path.as_str()))
            .collect();
        assert_eq!(listed, [(Method::POST, "/users"), (Method::GET, "/users/{id}")]);
    }
}
