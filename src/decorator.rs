//! Annotation factory.
//!
//! An [`Annotation`] is built once from a merge function and then applied to
//! owners (controller types or methods) any number of times. Each
//! application either creates the stored value or folds new arguments into
//! the existing one:
//!
//! ```text
//! merge(args, ctx) returns   existing value?   stored afterwards
//! ───────────────────────    ───────────────   ─────────────────────────────
//! Some(v)                    either            v
//! None                       yes               the existing value, as mutated
//!                                              through ctx.metadata
//! None                       no                nothing: Error::MergeWithoutValue
//! ```
//!
//! Applications fold in the order they are made.
//!
//! ```rust
//! use std::collections::HashSet;
//! use tsu_controller::{Annotation, DecoratorContext, metadata::Owner};
//!
//! let roles = Annotation::named("roles", |args: Vec<&'static str>, ctx: DecoratorContext<'_, HashSet<&'static str>>| {
//!     match ctx.metadata {
//!         Some(set) => { set.extend(args); None }
//!         None => Some(args.into_iter().collect()),
//!     }
//! });
//!
//! struct Admin;
//! let class = Owner::class::<Admin>();
//! roles.apply(&class, vec!["admin"]).unwrap();
//! roles.apply(&class, vec!["root"]).unwrap();
//! assert_eq!(roles.get(&class).map(|set| set.len()), Some(2));
//! ```

use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use http::Method;
use tracing::trace;

use crate::error::Error;
use crate::metadata::{MetadataStore, Owner, OwnerKind};
use crate::middleware::BoxedMiddleware;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one [`Annotation`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AnnotationId {
    seq: u64,
    name: Option<&'static str>,
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "`{name}`#{}", self.seq),
            None => write!(f, "#{}", self.seq),
        }
    }
}

/// What a merge function sees besides its arguments.
pub struct DecoratorContext<'a, V> {
    /// The value stored by earlier applications to the same owner, if any.
    /// Mutate it in place and return `None` to accumulate.
    pub metadata: Option<&'a mut V>,
    target: &'a Owner,
}

impl<V> DecoratorContext<'_, V> {
    pub fn kind(&self) -> OwnerKind {
        self.target.kind()
    }

    pub fn name(&self) -> &str {
        self.target.name()
    }

    pub fn target(&self) -> &Owner {
        self.target
    }
}

type MergeFn<V, A> = Box<dyn Fn(A, DecoratorContext<'_, V>) -> Option<V> + Send + Sync>;

/// A reusable annotation storing values of type `V` built from arguments `A`.
///
/// The annotation doubles as the lookup key: hold on to it (usually in a
/// `static`) to read the values back later.
pub struct Annotation<V, A> {
    id: AnnotationId,
    store: MetadataStore<V>,
    merge: MergeFn<V, A>,
}

impl<V, A> Annotation<V, A> {
    pub fn new<F>(merge: F) -> Self
    where
        F: Fn(A, DecoratorContext<'_, V>) -> Option<V> + Send + Sync + 'static,
    {
        Self::build(None, Box::new(merge))
    }

    /// Like [`Annotation::new`], with a name shown in logs and errors.
    pub fn named<F>(name: &'static str, merge: F) -> Self
    where
        F: Fn(A, DecoratorContext<'_, V>) -> Option<V> + Send + Sync + 'static,
    {
        Self::build(Some(name), Box::new(merge))
    }

    fn build(name: Option<&'static str>, merge: MergeFn<V, A>) -> Self {
        let id = AnnotationId { seq: NEXT_ID.fetch_add(1, Ordering::Relaxed), name };
        Self { id, store: MetadataStore::new(), merge }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn name(&self) -> Option<&'static str> {
        self.id.name
    }

    /// Applies the annotation to `owner` with `args`.
    ///
    /// The merge function runs under this annotation's write lock, so readers
    /// see either the previous value or the folded one, never a gap. It may
    /// read other annotations but must not read or apply this one.
    pub fn apply(&self, owner: &Owner, args: A) -> Result<(), Error> {
        let stored = self.store.update(owner, |metadata| {
            (self.merge)(args, DecoratorContext { metadata, target: owner })
        });

        if !stored {
            return Err(Error::MergeWithoutValue {
                annotation: self.id,
                target: owner.to_string(),
            });
        }
        trace!(annotation = %self.id, target = %owner, "annotation applied");
        Ok(())
    }

    pub fn get(&self, owner: &Owner) -> Option<V>
    where
        V: Clone,
    {
        self.store.get(owner)
    }

    /// The value applied to the controller type `T` itself.
    pub fn class_metadata<T: 'static>(&self) -> Option<V>
    where
        V: Clone,
    {
        self.store.get_for_class::<T>()
    }
}

impl<V, A> fmt::Debug for Annotation<V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotation").field("id", &self.id).finish_non_exhaustive()
    }
}

// ── Built-in annotations ──────────────────────────────────────────────────────

/// One `(method, path)` registration declared on a controller method.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    pub method: Method,
    pub path: String,
}

/// Routes declared on a method, in declaration order.
///
/// Written by [`MethodDef::route`](crate::MethodDef::route) and its shortcuts.
pub static ROUTES: LazyLock<Annotation<Vec<Route>, Route>> =
    LazyLock::new(|| Annotation::named("routes", accumulate));

/// Middleware declared at class or method scope, in declaration order.
///
/// Written by the `use_middleware` builders.
pub static MIDDLEWARE: LazyLock<Annotation<Vec<BoxedMiddleware>, BoxedMiddleware>> =
    LazyLock::new(|| Annotation::named("middleware", accumulate));

fn accumulate<T>(item: T, ctx: DecoratorContext<'_, Vec<T>>) -> Option<Vec<T>> {
    match ctx.metadata {
        Some(items) => {
            items.push(item);
            None
        }
        None => Some(vec![item]),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicBool;

    use super::*;

    struct Shop;

    fn roles() -> Annotation<BTreeSet<String>, Vec<&'static str>> {
        Annotation::named("roles", |args: Vec<&'static str>, ctx: DecoratorContext<'_, BTreeSet<String>>| {
            let args = args.into_iter().map(str::to_owned);
            match ctx.metadata {
                Some(set) => {
                    set.extend(args);
                    None
                }
                None => Some(args.collect()),
            }
        })
    }

    #[test]
    fn repeated_application_folds_into_one_entry() {
        let roles = roles();
        let class = Owner::class::<Shop>();

        roles.apply(&class, vec!["admin"]).unwrap();
        roles.apply(&class, vec!["root", "admin"]).unwrap();

        let stored = roles.get(&class).unwrap();
        assert_eq!(stored.into_iter().collect::<Vec<_>>(), ["admin", "root"]);
    }

    #[test]
    fn returned_value_replaces_the_entry() {
        let tag = Annotation::new(|value: &'static str, _: DecoratorContext<'_, &'static str>| Some(value));
        let class = Owner::class::<Shop>();
        let member = Owner::member(&class, "checkout");

        tag.apply(&member, "first").unwrap();
        tag.apply(&member, "second").unwrap();
        assert_eq!(tag.get(&member), Some("second"));
    }

    #[test]
    fn mutation_only_merge_cannot_go_first() {
        let counter = Annotation::named("counter", |step: u32, ctx: DecoratorContext<'_, u32>| {
            if let Some(total) = ctx.metadata {
                *total += step;
            }
            None
        });
        let class = Owner::class::<Shop>();
        let member = Owner::member(&class, "refund");

        let err = counter.apply(&member, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::MergeWithoutValue { ref target, .. } if target == "Shop::refund"
        ));
        assert_eq!(counter.get(&member), None);
    }

    #[test]
    fn readers_never_see_a_folding_value_disappear() {
        let roles = roles();
        let class = Owner::class::<Shop>();
        roles.apply(&class, vec!["admin"]).unwrap();

        let done = AtomicBool::new(false);
        let gaps = std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut gaps = 0usize;
                while !done.load(Ordering::Acquire) {
                    if roles.get(&class).is_none() {
                        gaps += 1;
                    }
                }
                gaps
            });
            for _ in 0..20_000 {
                roles.apply(&class, vec!["admin"]).unwrap();
            }
            done.store(true, Ordering::Release);
            reader.join().unwrap()
        });

        assert_eq!(gaps, 0);
    }

    #[test]
    fn panicking_merge_keeps_the_previous_value() {
        let fragile = Annotation::new(|explode: bool, ctx: DecoratorContext<'_, u32>| {
            assert!(!explode, "merge failed");
            Some(ctx.metadata.map_or(1, |n| *n + 1))
        });
        let class = Owner::class::<Shop>();
        let member = Owner::member(&class, "fragile");
        fragile.apply(&member, false).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = fragile.apply(&member, true);
        }));
        assert!(outcome.is_err());
        assert_eq!(fragile.get(&member), Some(1));
    }

    #[test]
    fn distinct_annotations_never_collide() {
        let a = roles();
        let b = roles();
        let class = Owner::class::<Shop>();

        a.apply(&class, vec!["admin"]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(b.get(&class), None);

        b.apply(&class, vec!["guest"]).unwrap();
        assert_eq!(a.get(&class).unwrap().len(), 1);
        assert!(a.get(&class).unwrap().contains("admin"));
    }

    #[test]
    fn merge_sees_its_target() {
        let seen = Annotation::new(|(): (), ctx: DecoratorContext<'_, String>| {
            Some(format!("{:?}:{}", ctx.kind(), ctx.name()))
        });
        let class = Owner::class::<Shop>();
        let member = Owner::member(&class, "browse");

        seen.apply(&class, ()).unwrap();
        seen.apply(&member, ()).unwrap();
        assert_eq!(seen.get(&class).as_deref(), Some("Class:Shop"));
        assert_eq!(seen.get(&member).as_deref(), Some("Member:browse"));
    }

    #[test]
    fn built_in_routes_accumulate() {
        let class = Owner::class::<Shop>();
        let member = Owner::member(&class, "item");

        ROUTES.apply(&member, Route { method: Method::GET, path: "/item".into() }).unwrap();
        ROUTES.apply(&member, Route { method: Method::POST, path: "/item".into() }).unwrap();

        let routes = ROUTES.get(&member).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].method, Method::POST);
        assert_eq!(ROUTES.get(&class), None);
    }
}
