//! Message dispatch.
//!
//! # Dispatch Algorithm
//!
//! 1. Read the receiver's dispatch class (the object's `isa`, or the
//!    metaclass for a class receiver)
//! 2. Look the selector up through the per-class cache, walking the
//!    inheritance chain on a miss
//! 3. Validate the arguments against the method signature
//! 4. Invoke the implementation (native closure or hook trampoline)
//! 5. If nothing implements the selector, send `doesNotRecognizeSelector:`
//!    with the selector as its only argument; if that is missing too, fail
//!    with [`Error::SelectorNotFound`]
//!
//! # Thread Safety
//!
//! Dispatch releases every class lock before running an implementation, so
//! method bodies and hook callbacks may freely send messages or install
//! hooks.
//!
//! # Example
//!
//! ```rust
//! use oxaspect::{Class, Method, Object, Selector, Value};
//! use std::str::FromStr;
//!
//! let class = Class::new_root("DispatchDocExample").unwrap();
//! let sel = Selector::from_str("double:").unwrap();
//! class
//!     .add_method(
//!         Method::new(&sel, "q@:q", |_, _, args| {
//!             Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2))
//!         })
//!         .unwrap(),
//!     )
//!     .unwrap();
//!
//! let obj = Object::new(&class);
//! assert_eq!(obj.send(&sel, &[21.into()]).unwrap(), Value::Int(42));
//! ```

use crate::error::{Error, Result};
use crate::runtime::{
    Class, Method, Object, Selector, Value, does_not_recognize_selector,
};
use oxaspect_log::trace;
use std::cell::Cell;

/// Maximum nesting of message sends on one thread.
pub const MAX_DISPATCH_DEPTH: u32 = 512;

// Thread-local send depth for runaway recursion detection.
thread_local! {
    static DISPATCH_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Holds one level of dispatch depth for as long as it lives.
struct DepthGuard;

impl DepthGuard {
    fn enter(selector: &Selector) -> Result<Self> {
        DISPATCH_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_DISPATCH_DEPTH {
                return Err(Error::RecursionLimit {
                    selector: selector.name().to_string(),
                    depth: MAX_DISPATCH_DEPTH,
                });
            }
            depth.set(current + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// The receiver of a message: an instance, or a class for class methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receiver {
    Instance(Object),
    Class(Class),
}

impl Receiver {
    /// Class where lookup starts.
    #[must_use]
    pub fn dispatch_class(&self) -> Class {
        match self {
            Receiver::Instance(obj) => obj.dispatch_class(),
            Receiver::Class(class) => class.metaclass(),
        }
    }

    /// Declared class of an instance, or the class itself.
    #[must_use]
    pub fn class(&self) -> Class {
        match self {
            Receiver::Instance(obj) => obj.class(),
            Receiver::Class(class) => class.instance_class().unwrap_or(*class),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Receiver::Instance(obj) => Some(obj),
            Receiver::Class(_) => None,
        }
    }

    #[must_use]
    pub fn as_class(&self) -> Option<Class> {
        match self {
            Receiver::Instance(_) => None,
            Receiver::Class(class) => Some(*class),
        }
    }

    /// Sends another message to the same receiver.
    ///
    /// # Errors
    ///
    /// See [`send`].
    pub fn send(&self, selector: &Selector, args: &[Value]) -> Result<Value> {
        send(self, selector, args)
    }

    /// Sends `selector` starting lookup above `defining_class`.
    ///
    /// # Errors
    ///
    /// See [`send_super`].
    pub fn send_super(&self, defining_class: &Class, selector: &Selector, args: &[Value]) -> Result<Value> {
        send_super(self, defining_class, selector, args)
    }
}

impl From<Object> for Receiver {
    fn from(obj: Object) -> Self {
        Receiver::Instance(obj)
    }
}

impl From<&Object> for Receiver {
    fn from(obj: &Object) -> Self {
        Receiver::Instance(obj.clone())
    }
}

impl From<Class> for Receiver {
    fn from(class: Class) -> Self {
        Receiver::Class(class)
    }
}

/// Sends a message to an object.
///
/// # Errors
///
/// - [`Error::ArgumentCountMismatch`] / [`Error::ArgumentTypeMismatch`] if
///   `args` do not fit the method signature
/// - [`Error::SelectorNotFound`] if nothing handles the selector
/// - [`Error::RecursionLimit`] past [`MAX_DISPATCH_DEPTH`] nested sends
/// - any error returned by the implementation or a hook callback
pub fn send_message(obj: &Object, selector: &Selector, args: &[Value]) -> Result<Value> {
    send(&Receiver::Instance(obj.clone()), selector, args)
}

/// Sends a class message (looked up on the metaclass).
///
/// # Errors
///
/// Same as [`send_message`].
pub fn send_class_message(class: &Class, selector: &Selector, args: &[Value]) -> Result<Value> {
    send(&Receiver::Class(*class), selector, args)
}

/// Sends a message to any receiver.
///
/// # Errors
///
/// Same as [`send_message`].
pub fn send(receiver: &Receiver, selector: &Selector, args: &[Value]) -> Result<Value> {
    let _depth = DepthGuard::enter(selector)?;
    let class = receiver.dispatch_class();

    match class.lookup_method_cached(selector) {
        Some(method) => invoke_method(receiver, &method, args),
        None => not_recognized(receiver, &class, selector, args),
    }
}

/// Sends a message starting lookup at the superclass of `defining_class`.
///
/// Method bodies use this to call the implementation they override. Pass the
/// class that defines the calling body; for class methods pass the class (not
/// its metaclass).
///
/// # Errors
///
/// Same as [`send_message`].
pub fn send_super(
    receiver: &Receiver,
    defining_class: &Class,
    selector: &Selector,
    args: &[Value],
) -> Result<Value> {
    let _depth = DepthGuard::enter(selector)?;
    let defining = match receiver {
        Receiver::Instance(_) => *defining_class,
        Receiver::Class(_) => defining_class.metaclass(),
    };

    match defining.super_class().and_then(|s| s.lookup_method_cached(selector)) {
        Some(method) => invoke_method(receiver, &method, args),
        None => not_recognized(receiver, &receiver.dispatch_class(), selector, args),
    }
}

fn invoke_method(receiver: &Receiver, method: &Method, args: &[Value]) -> Result<Value> {
    method.signature.check_arguments(&method.selector, args)?;
    method.implementation.invoke(receiver, &method.selector, args)
}

fn not_recognized(receiver: &Receiver, class: &Class, selector: &Selector, args: &[Value]) -> Result<Value> {
    let fallback = does_not_recognize_selector()?;
    if *selector != fallback
        && let Some(method) = class.lookup_method_cached(&fallback)
    {
        trace!("selector not recognized, forwarding"; selector = selector, class = class, args = args.len());
        return invoke_method(receiver, &method, &[Value::Selector(*selector)]);
    }

    Err(Error::SelectorNotFound {
        selector: selector.name().to_string(),
        class: receiver.class().name().to_string(),
    })
}
