//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the handler and the response
//! on its way back. It is the right place for cross-cutting concerns:
//! tracing, authorization guards, request-id injection.
//!
//! A middleware is anything callable as `(Request, Next) -> impl Future`:
//!
//! ```rust
//! use tsu_controller::{Request, Response, StatusCode, middleware::Next};
//!
//! async fn require_token(req: Request, next: Next) -> Response {
//!     if req.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! }
//! ```
//!
//! Returning without calling [`Next::run`] short-circuits the rest of the
//! chain, handler included.

mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::IntoResponse;

pub use trace::trace;

/// Implemented for every valid middleware function.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = self(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A type-erased middleware shared by every route it is attached to.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of a middleware chain, ending in the route's handler.
///
/// Consumed by [`Next::run`], so the rest of the chain runs at most once.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, position: 0, endpoint }
    }

    /// Invokes the next middleware, or the handler once the chain is exhausted.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.chain.get(self.position).cloned() {
            Some(middleware) => {
                let rest = Self { position: self.position + 1, ..self };
                middleware.call(req, rest)
            }
            None => self.endpoint.call(req),
        }
    }
}
