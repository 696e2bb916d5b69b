//! # tsu-controller
//!
//! Annotated controllers for a minimal HTTP framework.
//!
//! Attach metadata (required roles, middleware, routes, your own tags) to a
//! controller type and to its methods. Read both levels back from any
//! middleware while a request is being handled, keyed by the annotation that
//! wrote them.
//!
//! ## The pieces
//!
//! - [`Annotation`]: built from a merge function; decides how repeated
//!   applications to the same target combine.
//! - [`metadata`]: owner identities and the weakly-owned stores behind every
//!   annotation.
//! - [`Controller`] / [`apply_controller`]: declare methods, routes and
//!   middleware once, mount them on a [`Router`].
//! - [`endpoint_context`]: the controller-level and endpoint-level metadata
//!   of the method handling the current request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashSet;
//! use std::sync::{Arc, LazyLock};
//!
//! use tsu_controller::{
//!     Annotation, Controller, ControllerDef, DecoratorContext, Request, Response, Router,
//!     Server, StatusCode, apply_controller, endpoint_context, middleware::Next,
//! };
//!
//! static ROLES: LazyLock<Annotation<HashSet<String>, &'static [&'static str]>> =
//!     LazyLock::new(|| Annotation::named("roles", |roles: &'static [&'static str], ctx: DecoratorContext<'_, HashSet<String>>| {
//!         let roles = roles.iter().map(|r| r.to_string());
//!         match ctx.metadata {
//!             Some(set) => { set.extend(roles); None }
//!             None => Some(roles.collect()),
//!         }
//!     }));
//!
//! async fn roles_guard(req: Request, next: Next) -> Response {
//!     let caller = req.header("x-role").unwrap_or_default().to_owned();
//!     let Ok(endpoint) = endpoint_context(&req) else {
//!         return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
//!     };
//!     if let Some(required) = endpoint.inherited_metadata(&ROLES) {
//!         if !required.contains(&caller) {
//!             return Response::status(StatusCode::FORBIDDEN);
//!         }
//!     }
//!     next.run(req).await
//! }
//!
//! struct Admin;
//!
//! impl Admin {
//!     async fn purge(self: Arc<Self>, _req: Request) -> &'static str { "purged" }
//! }
//!
//! impl Controller for Admin {
//!     fn describe(def: &mut ControllerDef<Self>) {
//!         def.annotate(&ROLES, &["admin"]).use_middleware(roles_guard);
//!         def.method("purge", Self::purge).post("/purge");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_controller::Error> {
//!     let app = apply_controller(Router::new(), Arc::new(Admin))?;
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//! ```

mod controller;
mod decorator;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod metadata;
pub mod middleware;

pub use controller::{Controller, ControllerDef, EndpointContext, MethodDef, apply_controller, endpoint_context};
pub use decorator::{Annotation, AnnotationId, DecoratorContext, MIDDLEWARE, ROUTES, Route};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
