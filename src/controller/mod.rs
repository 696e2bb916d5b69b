//! Controllers: declaring routes and metadata, and applying them to a router.
//!
//! A controller is a type whose methods handle requests. Instead of
//! attribute annotations, it describes itself once through
//! [`Controller::describe`]:
//!
//! ```rust
//! use std::sync::Arc;
//! use tsu_controller::{Controller, ControllerDef, Request, Router, apply_controller};
//!
//! struct Users;
//!
//! impl Users {
//!     async fn list(self: Arc<Self>, _req: Request) -> &'static str {
//!         "[]"
//!     }
//! }
//!
//! impl Controller for Users {
//!     fn describe(def: &mut ControllerDef<Self>) {
//!         def.use_middleware(tsu_controller::middleware::trace);
//!         def.method("list", Self::list).get("/users");
//!     }
//! }
//!
//! let router = apply_controller(Router::new(), Arc::new(Users)).unwrap();
//! assert_eq!(router.routes().len(), 1);
//! ```
//!
//! Annotation order is call order: within `describe`, applications to the
//! same owner fold in the order they are written, and middleware runs in the
//! order it is declared, class scope first.

mod context;

use std::any::{Any, TypeId, type_name};
use std::cell::Cell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use http::Method;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::decorator::{Annotation, MIDDLEWARE, ROUTES, Route};
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::metadata::Owner;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::IntoResponse;
use crate::router::Router;

pub use context::{EndpointContext, endpoint_context};
use context::ActiveEndpoint;

/// Resolved definitions, one per controller type, kept for the process
/// lifetime.
static DEFINITIONS: LazyLock<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// A type whose methods can be mounted on a [`Router`].
pub trait Controller: Send + Sync + Sized + 'static {
    /// Declares the controller's routes, middleware and metadata.
    ///
    /// Runs once per type, the first time the controller is applied. It
    /// cannot resolve or apply controllers itself; such calls fail with
    /// [`Error::ReentrantDescribe`].
    fn describe(def: &mut ControllerDef<Self>);
}

thread_local! {
    static DESCRIBING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as resolving a definition until dropped.
struct Describing;

impl Describing {
    fn enter() -> Option<Self> {
        if DESCRIBING.replace(true) {
            return None;
        }
        Some(Self)
    }
}

impl Drop for Describing {
    fn drop(&mut self) {
        DESCRIBING.set(false);
    }
}

type BoxedEndpoint<C> = Arc<dyn Fn(Arc<C>, Request) -> BoxFuture + Send + Sync>;

/// Everything [`Controller::describe`] declared for `C`.
pub struct ControllerDef<C> {
    class: Owner,
    methods: Vec<MethodDef<C>>,
    error: Option<Error>,
}

/// One declared controller method.
pub struct MethodDef<C> {
    owner: Owner,
    endpoint: BoxedEndpoint<C>,
    error: Option<Error>,
}

impl<C: Controller> ControllerDef<C> {
    /// Returns the definition of `C`, running `describe` the first time.
    ///
    /// A definition whose annotations failed is returned as an error and not
    /// kept; its owners are dropped along with the metadata they carried.
    ///
    /// Calling this (or [`apply_controller`]) from inside a `describe` fails
    /// with [`Error::ReentrantDescribe`].
    pub fn resolve() -> Result<Arc<Self>, Error> {
        let Some(_describing) = Describing::enter() else {
            warn!(controller = type_name::<C>(), "controller resolved from inside describe");
            return Err(Error::ReentrantDescribe { controller: type_name::<C>() });
        };
        let mut definitions = DEFINITIONS.lock();
        if let Some(def) = definitions.get(&TypeId::of::<C>()) {
            if let Ok(def) = Arc::clone(def).downcast::<Self>() {
                return Ok(def);
            }
        }

        let class = Owner::class::<C>();
        let mut def = Self { class: class.clone(), methods: Vec::new(), error: None };
        C::describe(&mut def);
        let def = match def.finish() {
            Ok(def) => Arc::new(def),
            Err(err) => {
                // A retry must not fold into what this attempt left behind.
                Owner::forget_class::<C>(&class);
                return Err(err);
            }
        };
        definitions.insert(TypeId::of::<C>(), def.clone());
        debug!(controller = %def.class, methods = def.methods.len(), "controller described");
        Ok(def)
    }

    fn finish(mut self) -> Result<Self, Error> {
        let first = self.error.take()
            .into_iter()
            .chain(self.methods.iter_mut().filter_map(|m| m.error.take()))
            .next();
        match first {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Applies `annotation` to the controller type.
    pub fn annotate<V, A>(&mut self, annotation: &Annotation<V, A>, args: A) -> &mut Self {
        record(&mut self.error, annotation.apply(&self.class, args));
        self
    }

    /// Adds middleware to every route of this controller. Class-scope
    /// middleware wraps method-scope middleware.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        let middleware: BoxedMiddleware = Arc::new(middleware);
        record(&mut self.error, MIDDLEWARE.apply(&self.class, middleware));
        self
    }

    /// Declares the method `name`, handled by `endpoint`.
    ///
    /// `endpoint` is usually a method taking `self: Arc<Self>`. Declaring the
    /// same name again reopens the existing method and replaces its body; the
    /// method keeps its identity and metadata.
    pub fn method<F, Fut, R>(&mut self, name: &str, endpoint: F) -> &mut MethodDef<C>
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let endpoint: BoxedEndpoint<C> = Arc::new(move |controller: Arc<C>, req: Request| -> BoxFuture {
            let fut = endpoint(controller, req);
            Box::pin(async move { fut.await.into_response() })
        });

        match self.methods.iter().position(|m| m.owner.name() == name) {
            Some(index) => {
                warn!(method = %self.methods[index].owner, "method declared twice, replacing its body");
                let method = &mut self.methods[index];
                method.endpoint = endpoint;
                method
            }
            None => {
                let owner = Owner::member(&self.class, name);
                self.methods.push(MethodDef { owner, endpoint, error: None });
                let last = self.methods.len() - 1;
                &mut self.methods[last]
            }
        }
    }

    /// The controller type's owner identity.
    pub fn class(&self) -> &Owner {
        &self.class
    }

    /// The owner identity of the declared method `name`.
    pub fn member(&self, name: &str) -> Option<&Owner> {
        self.methods.iter()
            .map(|m| &m.owner)
            .find(|owner| owner.name() == name)
    }
}

impl<C> MethodDef<C> {
    /// Applies `annotation` to this method.
    pub fn annotate<V, A>(&mut self, annotation: &Annotation<V, A>, args: A) -> &mut Self {
        record(&mut self.error, annotation.apply(&self.owner, args));
        self
    }

    /// Adds middleware to this method's routes only, inside any class-scope
    /// middleware.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        let middleware: BoxedMiddleware = Arc::new(middleware);
        record(&mut self.error, MIDDLEWARE.apply(&self.owner, middleware));
        self
    }

    /// Routes `method path` to this method. May be called any number of times.
    pub fn route(&mut self, method: Method, path: &str) -> &mut Self {
        let route = Route { method, path: path.to_owned() };
        record(&mut self.error, ROUTES.apply(&self.owner, route));
        self
    }

    pub fn get(&mut self, path: &str) -> &mut Self {
        self.route(Method::GET, path)
    }

    pub fn post(&mut self, path: &str) -> &mut Self {
        self.route(Method::POST, path)
    }

    pub fn put(&mut self, path: &str) -> &mut Self {
        self.route(Method::PUT, path)
    }

    pub fn patch(&mut self, path: &str) -> &mut Self {
        self.route(Method::PATCH, path)
    }

    pub fn delete(&mut self, path: &str) -> &mut Self {
        self.route(Method::DELETE, path)
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }
}

/// Keeps the first failure; later ones are usually knock-on effects.
fn record(slot: &mut Option<Error>, result: Result<(), Error>) {
    if let Err(err) = result {
        debug!(%err, "annotation failed");
        slot.get_or_insert(err);
    }
}

/// A controller method bound to one controller instance.
struct BoundEndpoint<C> {
    controller: Arc<C>,
    endpoint: BoxedEndpoint<C>,
}

impl<C: Send + Sync + 'static> ErasedHandler for BoundEndpoint<C> {
    fn call(&self, req: Request) -> BoxFuture {
        (self.endpoint)(Arc::clone(&self.controller), req)
    }
}

/// Mounts every routed method of `controller` on `router`.
///
/// For each declared method carrying at least one route, in declaration
/// order:
///
/// 1. one [`EndpointContext`] is built over the controller's and the
///    method's owners;
/// 2. the middleware chain is class-scope middleware followed by
///    method-scope middleware, each in declaration order;
/// 3. every declared `(method, path)` is registered with a handler that
///    installs the context on the request, then runs the chain and finally
///    the method body.
///
/// Methods without routes are skipped. Applying the same instance to several
/// routers yields the same routes and the same metadata every time.
pub fn apply_controller<C: Controller>(mut router: Router, controller: Arc<C>) -> Result<Router, Error> {
    let def = ControllerDef::<C>::resolve()?;
    let class_middleware = MIDDLEWARE.get(&def.class).unwrap_or_default();
    let mut mounted = 0usize;

    for method in &def.methods {
        let Some(routes) = ROUTES.get(&method.owner) else {
            debug!(method = %method.owner, "no routes declared, skipping");
            continue;
        };

        let context = Arc::new(EndpointContext::new(def.class.clone(), method.owner.clone()));
        let chain: Arc<[BoxedMiddleware]> = class_middleware.iter()
            .cloned()
            .chain(MIDDLEWARE.get(&method.owner).unwrap_or_default())
            .collect();
        let endpoint: BoxedHandler = Arc::new(BoundEndpoint {
            controller: Arc::clone(&controller),
            endpoint: Arc::clone(&method.endpoint),
        });

        let handler = (move |mut req: Request| {
            req.insert_extension(ActiveEndpoint(Arc::clone(&context)));
            Next::new(Arc::clone(&chain), Arc::clone(&endpoint)).run(req)
        })
        .into_boxed_handler();

        for Route { method: http_method, path } in routes {
            router.insert(http_method, &path, Arc::clone(&handler))?;
            mounted += 1;
        }
    }

    info!(controller = %def.class, routes = mounted, "controller applied");
    Ok(router)
}
