//! `Class` creation, inheritance and method tables.
//!
//! # Architecture
//!
//! Classes are **globally registered** and never deallocated:
//! - Each class name maps to exactly one `Class`
//! - `Class` is a `Copy` handle to `'static` data
//! - Single inheritance; metaclasses mirror the instance-side hierarchy
//!
//! Each class owns a method table keyed by [`Selector`]. A table entry holds
//! either a native implementation or a hook trampoline; the hook engine is
//! the only code that installs trampolines.
//!
//! # Thread Safety
//!
//! The registry, every method table and every lookup cache sit behind their
//! own `RwLock`. Dispatch takes read locks, plus a write lock to fill a
//! cache miss.

use crate::aspect::trampoline::Trampoline;
use crate::error::{Error, Result};
use crate::runtime::dispatch::{self, Receiver};
use crate::runtime::encoding::Signature;
use crate::runtime::{Selector, Value, bump_dispatch_epoch, dispatch_epoch, read_lock, write_lock};
use bitflags::bitflags;
use fxhash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, OnceLock, RwLock};

/// Native method implementation.
///
/// Receives the receiver (`self`), the selector that was sent (`_cmd`) and
/// the explicit arguments, already validated against the method signature.
pub type Imp = Arc<dyn Fn(&Receiver, &Selector, &[Value]) -> Result<Value> + Send + Sync>;

/// What a method-table entry runs when its selector is dispatched.
#[derive(Clone)]
pub enum Implementation {
    /// A plain implementation.
    Native(Imp),
    /// A hook trampoline that runs the hook chain around the original.
    Trampoline(Arc<Trampoline>),
}

impl Implementation {
    /// Runs this implementation.
    ///
    /// # Errors
    ///
    /// Propagates whatever the implementation or a hook callback returns.
    pub fn invoke(&self, receiver: &Receiver, selector: &Selector, args: &[Value]) -> Result<Value> {
        match self {
            Implementation::Native(imp) => imp(receiver, selector, args),
            Implementation::Trampoline(trampoline) => trampoline.invoke(receiver, args),
        }
    }

    /// Returns `true` if this entry is a hook trampoline.
    #[must_use]
    pub fn is_trampoline(&self) -> bool {
        matches!(self, Implementation::Trampoline(_))
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Native(imp) => {
                write!(f, "Native({:p})", Arc::as_ptr(imp).cast::<()>())
            }
            Implementation::Trampoline(t) => {
                write!(f, "Trampoline({} on {})", t.selector(), t.host().name())
            }
        }
    }
}

/// `Method` representation: selector, signature and implementation.
///
/// # Example
///
/// ```rust
/// use oxaspect::{Class, Method, Selector, Value};
/// use std::str::FromStr;
///
/// let class = Class::new_root("MethodDocExample").unwrap();
/// let sel = Selector::from_str("answer").unwrap();
/// let method = Method::new(&sel, "q@:", |_, _, _| Ok(Value::Int(42))).unwrap();
/// class.add_method(method).unwrap();
///
/// assert!(class.instances_respond_to(&sel));
/// ```
#[derive(Clone, Debug)]
pub struct Method {
    /// `Method` selector
    pub selector: Selector,
    /// Parsed type encoding
    pub signature: Arc<Signature>,
    /// What runs on dispatch
    pub implementation: Implementation,
}

impl Method {
    /// Creates a method from a closure and a type encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if `types` does not parse.
    pub fn new<F>(selector: &Selector, types: &str, imp: F) -> Result<Self>
    where
        F: Fn(&Receiver, &Selector, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Ok(Method {
            selector: *selector,
            signature: Arc::new(Signature::parse(types)?),
            implementation: Implementation::Native(Arc::new(imp)),
        })
    }

    /// Returns `true` if this entry currently runs a hook trampoline.
    #[must_use]
    pub fn is_hooked(&self) -> bool {
        self.implementation.is_trampoline()
    }
}

bitflags! {
    /// Per-class flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u32 {
        /// The class refuses subclasses, including isolation subclasses.
        const SEALED = 1 << 0;
        /// The class is a metaclass (hosts class methods).
        const META = 1 << 1;
        /// The class is a per-instance isolation subclass.
        const ISOLATION = 1 << 2;
    }
}

/// Cached lookup result, valid while the dispatch epoch is unchanged.
struct CacheEntry {
    epoch: u64,
    method: Method,
}

/// Internal class data. Leaked on creation, never freed.
pub(crate) struct ClassInner {
    name: Box<str>,
    super_class: Option<Class>,
    flags: ClassFlags,
    methods: RwLock<FxHashMap<Selector, Method>>,
    declarations: RwLock<FxHashMap<Selector, Arc<Signature>>>,
    cache: RwLock<FxHashMap<Selector, CacheEntry>>,
    metaclass: OnceLock<Class>,
    /// For metaclasses: the class whose class methods this one hosts.
    instance_class: Option<Class>,
    /// For isolation subclasses: the class the instance reports as its own.
    identity: Option<Class>,
}

static REGISTRY: LazyLock<RwLock<FxHashMap<&'static str, Class>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// `Class` represents a runtime class definition.
///
/// # Example
///
/// ```rust
/// use oxaspect::Class;
///
/// let root = Class::new_root("ClassDocRoot").unwrap();
/// let child = Class::new("ClassDocChild", &root).unwrap();
///
/// assert!(child.is_subclass_of(&root));
/// assert!(root.super_class().is_none());
/// ```
#[derive(Clone, Copy)]
pub struct Class {
    inner: &'static ClassInner,
}

impl Class {
    /// Creates a new root class (no superclass).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassAlreadyExists`] if the name is taken.
    pub fn new_root(name: &str) -> Result<Self> {
        Self::create_class(name, None, ClassFlags::empty(), None)
    }

    /// Creates a new class with a superclass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InheritanceCycle`] if `name` already appears in the
    /// superclass chain, [`Error::SealedClass`] if `super_class` refuses
    /// subclasses, or [`Error::ClassAlreadyExists`] if the name is taken.
    pub fn new(name: &str, super_class: &Class) -> Result<Self> {
        Self::check_inheritance_cycle(name, super_class)?;
        Self::check_subclassable(super_class)?;
        Self::create_class(name, Some(*super_class), ClassFlags::empty(), None)
    }

    /// Creates a class that refuses subclasses.
    ///
    /// Instances of a sealed class cannot be hooked individually, since that
    /// requires an isolation subclass. Class-scope hooks still work.
    ///
    /// # Errors
    ///
    /// Same as [`Class::new`].
    pub fn new_sealed(name: &str, super_class: Option<&Class>) -> Result<Self> {
        if let Some(parent) = super_class {
            Self::check_inheritance_cycle(name, parent)?;
            Self::check_subclassable(parent)?;
        }
        Self::create_class(name, super_class.copied(), ClassFlags::SEALED, None)
    }

    /// Returns the root class named `name`, creating it if needed.
    pub(crate) fn intern_root(name: &str) -> Self {
        if let Some(class) = Self::from_name(name) {
            return class;
        }
        Self::create_class(name, None, ClassFlags::empty(), None)
            .ok()
            .or_else(|| Self::from_name(name))
            .unwrap_or_else(|| Self::leak(name, None, ClassFlags::empty(), None, None))
    }

    /// Creates the isolation subclass for one instance.
    pub(crate) fn new_isolation(name: &str, parent: &Class, identity: Class) -> Result<Self> {
        Self::check_subclassable(parent)?;
        Self::create_class(name, Some(*parent), ClassFlags::ISOLATION, Some(identity))
    }

    fn create_class(
        name: &str,
        super_class: Option<Class>,
        flags: ClassFlags,
        identity: Option<Class>,
    ) -> Result<Self> {
        if read_lock(&REGISTRY).contains_key(name) {
            return Err(Error::ClassAlreadyExists {
                name: name.to_string(),
            });
        }

        let mut registry = write_lock(&REGISTRY);
        // Another thread might have registered it while we waited.
        if registry.contains_key(name) {
            return Err(Error::ClassAlreadyExists {
                name: name.to_string(),
            });
        }

        let class = Self::leak(name, super_class, flags, None, identity);
        registry.insert(class.name(), class);
        Ok(class)
    }

    fn leak(
        name: &str,
        super_class: Option<Class>,
        flags: ClassFlags,
        instance_class: Option<Class>,
        identity: Option<Class>,
    ) -> Self {
        let inner: &'static ClassInner = Box::leak(Box::new(ClassInner {
            name: name.into(),
            super_class,
            flags,
            methods: RwLock::new(FxHashMap::default()),
            declarations: RwLock::new(FxHashMap::default()),
            cache: RwLock::new(FxHashMap::default()),
            metaclass: OnceLock::new(),
            instance_class,
            identity,
        }));
        Class { inner }
    }

    fn check_inheritance_cycle(new_class_name: &str, super_class: &Class) -> Result<()> {
        if super_class.ancestors().any(|c| c.name() == new_class_name) {
            return Err(Error::InheritanceCycle);
        }
        Ok(())
    }

    fn check_subclassable(parent: &Class) -> Result<()> {
        if parent
            .flags()
            .intersects(ClassFlags::SEALED | ClassFlags::ISOLATION | ClassFlags::META)
        {
            return Err(Error::SealedClass {
                class: parent.name().to_string(),
            });
        }
        Ok(())
    }

    /// Looks up a registered class by name.
    ///
    /// Metaclasses are not registered; use [`Class::metaclass`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Class> {
        read_lock(&REGISTRY).get(name).copied()
    }

    /// Returns the class name. A metaclass shares its class's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        &self.inner.name
    }

    #[must_use]
    pub fn super_class(&self) -> Option<Class> {
        self.inner.super_class
    }

    #[must_use]
    pub fn flags(&self) -> ClassFlags {
        self.inner.flags
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.flags.contains(ClassFlags::SEALED)
    }

    #[must_use]
    pub fn is_metaclass(&self) -> bool {
        self.inner.flags.contains(ClassFlags::META)
    }

    #[must_use]
    pub fn is_isolation(&self) -> bool {
        self.inner.flags.contains(ClassFlags::ISOLATION)
    }

    /// The class this class presents as.
    ///
    /// For an isolation subclass this is the instance's declared class; for
    /// every other class it is the class itself.
    #[must_use]
    pub fn identity(&self) -> Class {
        self.inner.identity.unwrap_or(*self)
    }

    /// For a metaclass, the class whose class methods it hosts.
    #[must_use]
    pub fn instance_class(&self) -> Option<Class> {
        self.inner.instance_class
    }

    /// Returns the metaclass, creating it on first use.
    ///
    /// The metaclass of `C` inherits from the metaclass of `C`'s superclass,
    /// so class methods are inherited like instance methods. The metaclass of
    /// a metaclass is itself.
    #[must_use]
    pub fn metaclass(&self) -> Class {
        if self.is_metaclass() {
            return *self;
        }
        *self.inner.metaclass.get_or_init(|| {
            let super_meta = self.super_class().map(|s| s.metaclass());
            Self::leak(self.name(), super_meta, ClassFlags::META, Some(*self), None)
        })
    }

    /// Iterates over this class and its superclasses, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Class> {
        std::iter::successors(Some(*self), Class::super_class)
    }

    /// Checks if this class is `other` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ancestors().any(|c| c == *other)
    }

    /// Adds (or replaces) an instance method.
    ///
    /// # Errors
    ///
    /// Currently always `Ok`; kept fallible to match the rest of the
    /// registration API.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oxaspect::{Class, Method, Selector, Value};
    /// use std::str::FromStr;
    ///
    /// let class = Class::new_root("AddMethodDoc").unwrap();
    /// let sel = Selector::from_str("ping").unwrap();
    /// class.add_method(Method::new(&sel, "v@:", |_, _, _| Ok(Value::Void)).unwrap()).unwrap();
    /// assert!(class.local_method(&sel).is_some());
    /// ```
    pub fn add_method(&self, method: Method) -> Result<()> {
        self.set_local_method(method);
        Ok(())
    }

    /// Adds a class method (an instance method of the metaclass).
    ///
    /// # Errors
    ///
    /// See [`Class::add_method`].
    pub fn add_class_method(&self, method: Method) -> Result<()> {
        self.metaclass().add_method(method)
    }

    /// Declares the signature of a selector without implementing it.
    ///
    /// Hooking a declared but unimplemented selector installs a stub whose
    /// return value is the default for the declared return type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if `types` does not parse.
    pub fn declare_method(&self, selector: &Selector, types: &str) -> Result<()> {
        let signature = Arc::new(Signature::parse(types)?);
        write_lock(&self.inner.declarations).insert(*selector, signature);
        Ok(())
    }

    /// Finds a declared signature in this class or an ancestor.
    #[must_use]
    pub fn declared_signature(&self, selector: &Selector) -> Option<Arc<Signature>> {
        self.ancestors()
            .find_map(|c| read_lock(&c.inner.declarations).get(selector).cloned())
    }

    /// Returns the method defined directly on this class, if any.
    #[must_use]
    pub fn local_method(&self, selector: &Selector) -> Option<Method> {
        read_lock(&self.inner.methods).get(selector).cloned()
    }

    /// Selectors defined directly on this class.
    #[must_use]
    pub fn local_selectors(&self) -> Vec<Selector> {
        read_lock(&self.inner.methods).keys().copied().collect()
    }

    pub(crate) fn has_local_trampoline(&self, selector: &Selector) -> bool {
        read_lock(&self.inner.methods)
            .get(selector)
            .is_some_and(Method::is_hooked)
    }

    /// Replaces the local entry for `method.selector`, returning the old one.
    pub(crate) fn set_local_method(&self, method: Method) -> Option<Method> {
        let previous = write_lock(&self.inner.methods).insert(method.selector, method);
        bump_dispatch_epoch();
        previous
    }

    pub(crate) fn remove_local_method(&self, selector: &Selector) -> Option<Method> {
        let previous = write_lock(&self.inner.methods).remove(selector);
        bump_dispatch_epoch();
        previous
    }

    /// Looks up a method in this class or its ancestors, bypassing the cache.
    #[must_use]
    pub fn lookup_method(&self, selector: &Selector) -> Option<Method> {
        self.ancestors().find_map(|c| c.local_method(selector))
    }

    /// Cached lookup used by dispatch.
    pub(crate) fn lookup_method_cached(&self, selector: &Selector) -> Option<Method> {
        // Read the epoch first: a table change during the walk then leaves
        // the entry stale instead of wrongly fresh.
        let epoch = dispatch_epoch();
        if let Some(entry) = read_lock(&self.inner.cache).get(selector)
            && entry.epoch == epoch
        {
            return Some(entry.method.clone());
        }

        let method = self.lookup_method(selector)?;
        write_lock(&self.inner.cache).insert(
            *selector,
            CacheEntry {
                epoch,
                method: method.clone(),
            },
        );
        Some(method)
    }

    /// Checks if instances of this class respond to `selector`.
    #[must_use]
    pub fn instances_respond_to(&self, selector: &Selector) -> bool {
        self.lookup_method(selector).is_some()
    }

    /// Checks if the class itself responds to `selector` (class methods).
    #[must_use]
    pub fn responds_to(&self, selector: &Selector) -> bool {
        self.metaclass().lookup_method(selector).is_some()
    }

    /// Sends a class message.
    ///
    /// # Errors
    ///
    /// See [`send_class_message`](crate::runtime::dispatch::send_class_message).
    pub fn send(&self, selector: &Selector, args: &[Value]) -> Result<Value> {
        dispatch::send_class_message(self, selector, args)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("flags", &self.flags())
            .field("super_class", &self.super_class().map(|c| c.name()))
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
