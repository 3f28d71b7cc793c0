//! Method interception.
//!
//! Attach callbacks that run before, instead of, or after a method, either
//! for every instance of a class or for one instance only.
//!
//! - [`hook_class`] / [`hook_class_with_selector`]: class scope. Covers all
//!   instances of the class and its subclasses. If the selector exists only
//!   as a class method, the class method is hooked.
//! - [`hook_instance`] / [`hook_instance_with_selector`]: one instance. The
//!   instance is moved onto a private subclass; its declared class and
//!   identity are unchanged.
//! - [`unhook`] / [`unhook_selector`]: removal. When the last hook for a
//!   method goes away the original is restored exactly.
//!
//! # Semantics
//!
//! - Before callbacks run in registration order and cannot invoke the
//!   original.
//! - Only the most recently registered Instead callback runs. It decides
//!   whether and how often the original runs. Without one, the original runs
//!   once.
//! - After callbacks run in registration order and see the return value.
//! - Hooking a selector nothing implements installs a stub returning the
//!   default value of the declared return type (void when undeclared).
//! - If a class and one of its ancestors are both hooked for a selector, a
//!   call fires only the chain nearest to the receiver. Instance hooks
//!   likewise shadow class hooks for that instance.
//!
//! # Example
//!
//! ```rust
//! use oxaspect::{aspect, Class, Method, Object, Position, Selector, Value};
//! use std::str::FromStr;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let user = Class::new_root("AspectDocUser").unwrap();
//! let login = Selector::from_str("login:").unwrap();
//! user.add_method(Method::new(&login, "v@:*", |_, _, _| Ok(Value::Void)).unwrap())
//!     .unwrap();
//!
//! let count = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&count);
//! let id = aspect::hook_class(&user, &login, Position::After, move |call| {
//!     assert_eq!(call.argument(0).unwrap().as_str(), Some("alice"));
//!     seen.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! })
//! .unwrap();
//!
//! let obj = Object::new(&user);
//! obj.send(&login, &["alice".into()]).unwrap();
//! assert_eq!(count.load(Ordering::SeqCst), 1);
//!
//! aspect::unhook(id);
//! obj.send(&login, &["alice".into()]).unwrap();
//! assert_eq!(count.load(Ordering::SeqCst), 1);
//! ```

pub(crate) mod capture;
pub(crate) mod record;
pub(crate) mod resolver;
pub(crate) mod subclass;
pub(crate) mod table;
pub(crate) mod trampoline;

pub use capture::AspectObject;
pub use record::{
    AspectCallback, HookId, HookInfo, PlainCallback, Position, SelectorCallback, Target,
    TargetDescriptor,
};
pub use subclass::ISOLATION_INFIX;
pub use trampoline::Trampoline;

use crate::error::Result;
use crate::runtime::{Class, Object, Selector};

/// Installs a hook of either callback form on any target.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTarget`](crate::Error::UnsupportedTarget) if
/// an instance target cannot be isolated (its class is sealed).
pub fn install(
    target: impl Into<Target>,
    selector: &Selector,
    position: Position,
    callback: AspectCallback,
) -> Result<HookId> {
    table::table().install(&target.into(), selector, position, callback)
}

/// Hooks `selector` for every instance of `class` and its subclasses.
///
/// # Errors
///
/// Class-scope installation does not currently fail; the `Result` matches
/// the instance-scope API.
pub fn hook_class<F>(class: &Class, selector: &Selector, position: Position, callback: F) -> Result<HookId>
where
    F: Fn(&AspectObject) -> Result<()> + Send + Sync + 'static,
{
    install(class, selector, position, AspectCallback::new(callback))
}

/// Like [`hook_class`], with a callback that also receives the selector.
///
/// # Errors
///
/// See [`hook_class`].
pub fn hook_class_with_selector<F>(
    class: &Class,
    selector: &Selector,
    position: Position,
    callback: F,
) -> Result<HookId>
where
    F: Fn(&AspectObject, &Selector) -> Result<()> + Send + Sync + 'static,
{
    install(class, selector, position, AspectCallback::with_selector(callback))
}

/// Hooks `selector` on `object` only.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTarget`](crate::Error::UnsupportedTarget) if
/// the object's class is sealed.
pub fn hook_instance<F>(object: &Object, selector: &Selector, position: Position, callback: F) -> Result<HookId>
where
    F: Fn(&AspectObject) -> Result<()> + Send + Sync + 'static,
{
    install(object, selector, position, AspectCallback::new(callback))
}

/// Like [`hook_instance`], with a callback that also receives the selector.
///
/// # Errors
///
/// See [`hook_instance`].
pub fn hook_instance_with_selector<F>(
    object: &Object,
    selector: &Selector,
    position: Position,
    callback: F,
) -> Result<HookId>
where
    F: Fn(&AspectObject, &Selector) -> Result<()> + Send + Sync + 'static,
{
    install(object, selector, position, AspectCallback::with_selector(callback))
}

/// Removes one hook. Returns `false` if the id is unknown or already removed.
pub fn unhook(id: HookId) -> bool {
    table::table().remove(id)
}

/// Removes every hook for `selector` on `target`. Returns how many were removed.
pub fn unhook_selector(target: impl Into<Target>, selector: &Selector) -> usize {
    table::table().remove_all(&target.into(), selector)
}

/// Describes the hooks currently installed for `selector` on `target`.
#[must_use]
pub fn hooks(target: impl Into<Target>, selector: &Selector) -> Vec<HookInfo> {
    table::table().hooks(&target.into(), selector)
}

/// Moves `object` onto its isolation subclass without hooking anything.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTarget`](crate::Error::UnsupportedTarget) if
/// the object's class is sealed.
pub fn isolate(object: &Object) -> Result<Class> {
    table::table().isolate(object)
}

/// Number of (class, selector) pairs currently carrying a trampoline.
#[must_use]
pub fn installation_count() -> usize {
    table::table().installation_count()
}

/// Number of hooks currently registered, across all installations.
#[must_use]
pub fn hook_count() -> usize {
    table::table().hook_count()
}

/// Removes every hook in the process and restores every original.
pub fn reset_all() {
    table::table().reset();
}

impl Class {
    /// Hooks `selector` on this class. See [`hook_class`].
    ///
    /// # Errors
    ///
    /// See [`hook_class`].
    pub fn hook<F>(&self, selector: &Selector, position: Position, callback: F) -> Result<HookId>
    where
        F: Fn(&AspectObject) -> Result<()> + Send + Sync + 'static,
    {
        hook_class(self, selector, position, callback)
    }

    /// Removes every class-scope hook for `selector`. See [`unhook_selector`].
    pub fn unhook_selector(&self, selector: &Selector) -> usize {
        unhook_selector(self, selector)
    }
}

impl Object {
    /// Hooks `selector` on this instance. See [`hook_instance`].
    ///
    /// # Errors
    ///
    /// See [`hook_instance`].
    pub fn hook<F>(&self, selector: &Selector, position: Position, callback: F) -> Result<HookId>
    where
        F: Fn(&AspectObject) -> Result<()> + Send + Sync + 'static,
    {
        hook_instance(self, selector, position, callback)
    }

    /// Removes every hook on this instance for `selector`.
    ///
    /// Class-scope hooks that reach this instance are left in place; remove
    /// them with [`Class::unhook_selector`].
    pub fn unhook_selector(&self, selector: &Selector) -> usize {
        unhook_selector(self, selector)
    }
}
