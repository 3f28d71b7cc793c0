//! Object instances.
//!
//! An object records two classes:
//!
//! - the **declared class**, fixed at creation, reported by [`Object::class`]
//!   and used by every type-identity query
//! - the **dispatch class** (`isa`), where message lookup starts
//!
//! The two only differ while the hook engine has moved the object onto a
//! per-instance isolation subclass. Dispatch reads `isa` once per send, so
//! swapping it is atomic with respect to in-flight sends.

use crate::error::Result;
use crate::runtime::{Class, Selector, Value, dispatch, read_lock, write_lock};
use fxhash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

struct ObjectInner {
    id: u64,
    class: Class,
    isa: RwLock<Class>,
    ivars: RwLock<FxHashMap<String, Value>>,
}

/// A reference-counted runtime object.
///
/// Cloning an `Object` creates another reference to the same instance.
///
/// # Example
///
/// ```rust
/// use oxaspect::{Class, Object};
///
/// let class = Class::new_root("ObjectDocExample").unwrap();
/// let a = Object::new(&class);
/// let b = a.clone();
///
/// assert_eq!(a, b);
/// assert_eq!(a.class().name(), "ObjectDocExample");
/// assert_eq!(a.refcount(), 2);
/// ```
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    /// Creates a new instance of `class`.
    #[must_use]
    pub fn new(class: &Class) -> Self {
        let class = class.identity();
        Object {
            inner: Arc::new(ObjectInner {
                id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
                class,
                isa: RwLock::new(class),
                ivars: RwLock::new(FxHashMap::default()),
            }),
        }
    }

    /// Process-unique identity of this instance.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The declared class. Unaffected by instance-scope hooks.
    #[must_use]
    pub fn class(&self) -> Class {
        self.inner.class
    }

    /// The class message lookup starts from.
    #[must_use]
    pub fn dispatch_class(&self) -> Class {
        *read_lock(&self.inner.isa)
    }

    pub(crate) fn set_dispatch_class(&self, class: Class) {
        *write_lock(&self.inner.isa) = class;
    }

    /// Checks if the object is an instance of `class` or a subclass.
    #[must_use]
    pub fn is_kind_of(&self, class: &Class) -> bool {
        self.class().is_subclass_of(class)
    }

    /// Checks if the object's declared class is exactly `class`.
    #[must_use]
    pub fn is_member_of(&self, class: &Class) -> bool {
        self.class() == *class
    }

    #[must_use]
    pub fn responds_to(&self, selector: &Selector) -> bool {
        self.dispatch_class().instances_respond_to(selector)
    }

    /// Stores an instance variable.
    pub fn set_ivar(&self, name: &str, value: impl Into<Value>) {
        write_lock(&self.inner.ivars).insert(name.to_string(), value.into());
    }

    /// Reads an instance variable, `Nil` if unset.
    #[must_use]
    pub fn ivar(&self, name: &str) -> Value {
        read_lock(&self.inner.ivars)
            .get(name)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Number of live references to this instance.
    #[must_use]
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.inner))
    }

    /// Sends a message to this object.
    ///
    /// # Errors
    ///
    /// See [`send_message`](crate::runtime::dispatch::send_message).
    pub fn send(&self, selector: &Selector, args: &[Value]) -> Result<Value> {
        dispatch::send_message(self, selector, args)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.inner.id);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class().name())
            .field("id", &self.id())
            .finish()
    }
}

/// A non-owning reference to an [`Object`].
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    /// Returns the object if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(|inner| Object { inner })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObject(alive: {})", self.is_alive())
    }
}
