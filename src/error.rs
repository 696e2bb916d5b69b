//! Unified error type.

use http::Method;

use crate::decorator::AnnotationId;

/// The error type returned by the crate's fallible operations.
///
/// Application-level errors (403, 404, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// definition-time mistakes (a broken merge function, a conflicting route),
/// a missing endpoint context, and infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A merge function returned nothing on the first application, so there
    /// was no value to mutate and nothing to store.
    #[error("annotation {annotation} returned no value on its first application to `{target}`")]
    MergeWithoutValue { annotation: AnnotationId, target: String },

    /// [`endpoint_context`](crate::endpoint_context) was called on a request
    /// that did not go through a controller route.
    #[error("no active endpoint context on this request")]
    NoEndpointContext,

    /// A controller's `describe` tried to resolve or apply a controller.
    /// Definitions are resolved one at a time, so this would never finish.
    #[error("`{controller}` was resolved from inside a controller's describe")]
    ReentrantDescribe { controller: &'static str },

    /// The routing core rejected a registration.
    #[error("invalid route `{method} {path}`: {source}")]
    Route {
        method: Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// Binding or accepting on the server socket failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
