//! Owner identities.
//!
//! An [`Owner`] is the half of a metadata key that says *what* the metadata
//! is attached to: a controller type, or one method of a controller type.
//! Owners are minted on first use and compared by identity only. Two
//! controllers with identical fields and identical method names still get
//! different owners.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Class owners, keyed by the controller's `TypeId`.
///
/// Only weak references live here: the registry remembers an owner for as
/// long as something else keeps it alive, and mints a fresh one afterwards.
static CLASSES: LazyLock<Mutex<HashMap<TypeId, Weak<OwnerInner>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Process-unique owner number. Never reused, so a stale store entry can
/// never be mistaken for a live owner's entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct OwnerId(u64);

/// Whether an owner stands for a whole controller or one of its methods.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OwnerKind {
    Class,
    Member,
}

pub(super) struct OwnerInner {
    id: OwnerId,
    kind: OwnerKind,
    name: String,
    class: Option<Owner>,
}

/// Opaque identity of a controller type or controller method.
///
/// Cloning is cheap and yields the *same* identity.
#[derive(Clone)]
pub struct Owner(Arc<OwnerInner>);

impl Owner {
    /// Returns the class owner for `T`, minting it if `T` has none yet.
    pub fn class<T: 'static>() -> Self {
        let mut classes = CLASSES.lock();
        if let Some(owner) = classes.get(&TypeId::of::<T>()).and_then(Weak::upgrade) {
            return Self(owner);
        }
        let owner = Self::mint(OwnerKind::Class, short_type_name::<T>().to_owned(), None);
        classes.insert(TypeId::of::<T>(), Arc::downgrade(&owner.0));
        classes.retain(|_, weak| weak.strong_count() > 0);
        owner
    }

    /// Returns the live class owner for `T` without minting one.
    pub fn find_class<T: 'static>() -> Option<Self> {
        CLASSES
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(Weak::upgrade)
            .map(Self)
    }

    /// Unregisters `owner` as the class owner of `T`, so the next
    /// [`Owner::class`] mints a fresh identity. Clones already handed out
    /// stay valid but no longer stand for `T`.
    pub(crate) fn forget_class<T: 'static>(owner: &Owner) {
        let mut classes = CLASSES.lock();
        let registered = classes
            .get(&TypeId::of::<T>())
            .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(&owner.0)));
        if registered {
            classes.remove(&TypeId::of::<T>());
        }
    }

    /// Mints a fresh owner for the method `name` of `class`.
    pub fn member(class: &Owner, name: impl Into<String>) -> Self {
        Self::mint(OwnerKind::Member, name.into(), Some(class.clone()))
    }

    fn mint(kind: OwnerKind, name: String, class: Option<Owner>) -> Self {
        let id = OwnerId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self(Arc::new(OwnerInner { id, kind, name, class }))
    }

    pub fn kind(&self) -> OwnerKind {
        self.0.kind
    }

    /// The controller type name for classes, the method name for members.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The class a member belongs to. `None` for class owners.
    pub fn class_owner(&self) -> Option<&Owner> {
        self.0.class.as_ref()
    }

    pub(crate) fn id(&self) -> OwnerId {
        self.0.id
    }

    pub(super) fn downgrade(&self) -> Weak<OwnerInner> {
        Arc::downgrade(&self.0)
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Owner {}

/// `Controller` for classes, `Controller::method` for members.
impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.class {
            Some(class) => write!(f, "{}::{}", class.name(), self.0.name),
            None => f.write_str(&self.0.name),
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.0.id.0)
            .field("kind", &self.0.kind)
            .field("name", &self.to_string())
            .finish()
    }
}

/// `my_app::users::UserController` → `UserController`.
fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Users;
    struct Orders;

    #[test]
    fn class_owner_is_stable_while_alive() {
        let a = Owner::class::<Users>();
        let b = Owner::class::<Users>();
        assert_eq!(a, b);
        assert_ne!(a, Owner::class::<Orders>());
        assert_eq!(a.kind(), OwnerKind::Class);
        assert_eq!(a.name(), "Users");
    }

    #[test]
    fn members_never_share_identity() {
        let class = Owner::class::<Users>();
        let first = Owner::member(&class, "list");
        let second = Owner::member(&class, "list");
        assert_ne!(first, second);
        assert_eq!(first.class_owner(), Some(&class));
        assert_eq!(first.to_string(), "Users::list");
    }

    #[test]
    fn forgotten_class_owner_is_replaced() {
        struct Retired;
        let old = Owner::class::<Retired>();
        Owner::forget_class::<Retired>(&old);

        let fresh = Owner::class::<Retired>();
        assert_ne!(fresh, old);
        assert_eq!(Owner::find_class::<Retired>(), Some(fresh.clone()));

        Owner::forget_class::<Retired>(&old);
        assert_eq!(Owner::find_class::<Retired>(), Some(fresh));
    }

    #[test]
    fn dropped_class_owner_is_forgotten() {
        struct Scratch;
        let owner = Owner::class::<Scratch>();
        let id = owner.id();
        assert!(Owner::find_class::<Scratch>().is_some());
        drop(owner);
        assert!(Owner::find_class::<Scratch>().is_none());
        assert_ne!(Owner::class::<Scratch>().id(), id);
    }
}
