//! Request-time access to endpoint metadata.

use std::sync::Arc;

use crate::decorator::Annotation;
use crate::error::Error;
use crate::metadata::Owner;
use crate::request::Request;

/// Metadata view for one controller method.
///
/// Built once per `(controller instance, method)` when the controller is
/// applied, then shared by every request routed to that method, whichever
/// HTTP method or path matched.
#[derive(Debug)]
pub struct EndpointContext {
    controller: Owner,
    endpoint: Owner,
}

impl EndpointContext {
    pub(crate) fn new(controller: Owner, endpoint: Owner) -> Self {
        Self { controller, endpoint }
    }

    /// The value `annotation` holds for the controller type.
    pub fn controller_metadata<V: Clone, A>(&self, annotation: &Annotation<V, A>) -> Option<V> {
        annotation.get(&self.controller)
    }

    /// The value `annotation` holds for the method itself.
    pub fn endpoint_metadata<V: Clone, A>(&self, annotation: &Annotation<V, A>) -> Option<V> {
        annotation.get(&self.endpoint)
    }

    /// The method's value, falling back to the controller's.
    pub fn inherited_metadata<V: Clone, A>(&self, annotation: &Annotation<V, A>) -> Option<V> {
        self.endpoint_metadata(annotation)
            .or_else(|| self.controller_metadata(annotation))
    }

    pub fn controller(&self) -> &Owner {
        &self.controller
    }

    pub fn endpoint(&self) -> &Owner {
        &self.endpoint
    }
}

/// Request extension slot holding the installed context. Private, so the
/// only way in is through a controller route.
#[derive(Clone)]
pub(crate) struct ActiveEndpoint(pub(crate) Arc<EndpointContext>);

/// Returns the [`EndpointContext`] of the controller method handling `req`.
///
/// Fails with [`Error::NoEndpointContext`] when `req` was not routed through
/// [`apply_controller`](crate::apply_controller): a missing context is never
/// reported as "no metadata".
pub fn endpoint_context(req: &Request) -> Result<&EndpointContext, Error> {
    req.extension::<ActiveEndpoint>()
        .map(|active| active.0.as_ref())
        .ok_or(Error::NoEndpointContext)
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::decorator::DecoratorContext;

    struct Billing;

    fn tag() -> Annotation<&'static str, &'static str> {
        Annotation::new(|value: &'static str, _: DecoratorContext<'_, &'static str>| Some(value))
    }

    #[test]
    fn scopes_are_independent() {
        let tag = tag();
        let class = Owner::class::<Billing>();
        let invoices = Owner::member(&class, "invoices");
        let refunds = Owner::member(&class, "refunds");
        tag.apply(&class, "class-wide").unwrap();
        tag.apply(&invoices, "invoices-only").unwrap();

        let on_invoices = EndpointContext::new(class.clone(), invoices);
        let on_refunds = EndpointContext::new(class, refunds);

        assert_eq!(on_invoices.controller_metadata(&tag), Some("class-wide"));
        assert_eq!(on_invoices.endpoint_metadata(&tag), Some("invoices-only"));
        assert_eq!(on_refunds.controller_metadata(&tag), Some("class-wide"));
        assert_eq!(on_refunds.endpoint_metadata(&tag), None);
    }

    #[test]
    fn inherited_prefers_the_endpoint() {
        let tag = tag();
        let class = Owner::class::<Billing>();
        let pay = Owner::member(&class, "pay");
        let ctx = EndpointContext::new(class.clone(), pay.clone());

        assert_eq!(ctx.inherited_metadata(&tag), None);
        tag.apply(&class, "class").unwrap();
        assert_eq!(ctx.inherited_metadata(&tag), Some("class"));
        tag.apply(&pay, "method").unwrap();
        assert_eq!(ctx.inherited_metadata(&tag), Some("method"));
    }

    #[test]
    fn missing_context_is_an_error() {
        let req = Request::new(Method::GET, "/");
        assert!(matches!(endpoint_context(&req), Err(Error::NoEndpointContext)));
    }

    #[test]
    fn installed_context_is_found() {
        let class = Owner::class::<Billing>();
        let member = Owner::member(&class, "list");
        let mut req = Request::new(Method::GET, "/");
        req.insert_extension(ActiveEndpoint(Arc::new(EndpointContext::new(class, member.clone()))));

        let ctx = endpoint_context(&req).unwrap();
        assert_eq!(ctx.endpoint(), &member);
        assert_eq!(ctx.controller().name(), "Billing");
    }
}
