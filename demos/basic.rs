//! Minimal controller example: a roles guard driven by annotations.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42 -H 'x-roles: reader'
//!   curl -X DELETE http://localhost:3000/users/42 -H 'x-roles: reader'          # 403
//!   curl -X DELETE http://localhost:3000/users/42 -H 'x-roles: reader,admin'    # 204
//!   curl http://localhost:3000/healthz

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use tsu_controller::middleware::{self, Next};
use tsu_controller::{
    Annotation, Controller, ControllerDef, DecoratorContext, Request, Response, Router, Server,
    StatusCode, apply_controller, endpoint_context,
};

// Roles accumulate: every application adds to the same set.
static ROLES: LazyLock<Annotation<HashSet<String>, &'static [&'static str]>> = LazyLock::new(|| {
    Annotation::named("roles", |roles: &'static [&'static str], ctx: DecoratorContext<'_, HashSet<String>>| {
        let roles = roles.iter().map(|r| r.to_string());
        match ctx.metadata {
            Some(set) => {
                set.extend(roles);
                None
            }
            None => Some(roles.collect()),
        }
    })
});

async fn roles_guard(req: Request, next: Next) -> Response {
    if !allowed(&req) {
        return Response::status(StatusCode::FORBIDDEN);
    }
    next.run(req).await
}

// Both scopes must be satisfied. A request without an endpoint context is
// never allowed through.
fn allowed(req: &Request) -> bool {
    let caller: HashSet<&str> = req.header("x-roles").unwrap_or_default().split(',').collect();
    let Ok(endpoint) = endpoint_context(req) else {
        return false;
    };

    [endpoint.controller_metadata(&ROLES), endpoint.endpoint_metadata(&ROLES)]
        .into_iter()
        .flatten()
        .all(|required| required.iter().any(|role| caller.contains(role.as_str())))
}

struct Users;

impl Users {
    // GET /users/{id}
    async fn show(self: Arc<Self>, req: Request) -> Response {
        let id = req.param("id").unwrap_or("unknown");
        Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
    }

    // DELETE /users/{id} → 204 No Content
    async fn remove(self: Arc<Self>, _req: Request) -> StatusCode {
        StatusCode::NO_CONTENT
    }
}

impl Controller for Users {
    fn describe(def: &mut ControllerDef<Self>) {
        def.annotate(&ROLES, &["reader"])
            .use_middleware(middleware::trace)
            .use_middleware(roles_guard);
        def.method("show", Self::show).get("/users/{id}");
        def.method("remove", Self::remove)
            .annotate(&ROLES, &["admin"])
            .delete("/users/{id}");
    }
}

#[tokio::main]
async fn main() -> Result<(), tsu_controller::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new().get("/healthz", |_req: Request| async { "ok" });
    let app = apply_controller(app, Arc::new(Users))?;

    Server::bind("0.0.0.0:3000").serve(app).await
}
