//! The intercepted call as seen by hook callbacks.
//!
//! An [`AspectObject`] is created once per trampolined call and handed to
//! every callback in the chain. It carries the receiver, the selector, the
//! (possibly rewritten) arguments, the current return value and a handle
//! on the original implementation.
//!
//! # Phases
//!
//! | Phase    | `invoke_original()`              |
//! |----------|----------------------------------|
//! | Before   | `Err(Error::OriginalUnavailable)` |
//! | Instead  | runs the original                |
//! | After    | runs the original again          |
//!
//! Each successful `invoke_original()` replaces the return value of the
//! call, unless a later `set_return_value` overrides it.

use crate::aspect::trampoline::Trampoline;
use crate::error::{Error, Result};
use crate::runtime::{Object, Receiver, Selector, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Before,
    Instead,
    Original,
    After,
}

/// A captured call.
///
/// # Example
///
/// ```rust
/// use oxaspect::{aspect, Class, Method, Object, Position, Selector, Value};
/// use std::str::FromStr;
///
/// let class = Class::new_root("CaptureDocExample").unwrap();
/// let sel = Selector::from_str("greet:").unwrap();
/// class
///     .add_method(Method::new(&sel, "@@:@", |_, _, args| Ok(args[0].clone())).unwrap())
///     .unwrap();
///
/// aspect::hook_class(&class, &sel, Position::Instead, |call| {
///     call.set_argument(0, "hooked")?;
///     call.invoke_original()?;
///     Ok(())
/// })
/// .unwrap();
///
/// let obj = Object::new(&class);
/// let out = obj.send(&sel, &["plain".into()]).unwrap();
/// assert_eq!(out.as_str(), Some("hooked"));
/// ```
pub struct AspectObject {
    receiver: Receiver,
    selector: Selector,
    arguments: RefCell<Vec<Value>>,
    return_value: RefCell<Value>,
    trampoline: Arc<Trampoline>,
    phase: Cell<Phase>,
    invocations: Cell<u32>,
}

impl AspectObject {
    pub(crate) fn new(receiver: Receiver, arguments: Vec<Value>, trampoline: Arc<Trampoline>) -> Self {
        AspectObject {
            receiver,
            selector: trampoline.selector(),
            return_value: RefCell::new(trampoline.signature().return_type().default_value()),
            arguments: RefCell::new(arguments),
            trampoline,
            phase: Cell::new(Phase::Before),
            invocations: Cell::new(0),
        }
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.set(phase);
    }

    /// The receiver of the intercepted call.
    #[must_use]
    pub fn instance(&self) -> &Receiver {
        &self.receiver
    }

    /// The receiver as an object, `None` for class-method calls.
    #[must_use]
    pub fn object(&self) -> Option<&Object> {
        self.receiver.as_object()
    }

    /// The intercepted selector.
    #[must_use]
    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// The current arguments, in declaration order.
    #[must_use]
    pub fn arguments(&self) -> Vec<Value> {
        self.arguments.borrow().clone()
    }

    #[must_use]
    pub fn argument(&self, index: usize) -> Option<Value> {
        self.arguments.borrow().get(index).cloned()
    }

    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.arguments.borrow().len()
    }

    /// Rewrites one argument for the rest of the chain and for the original.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentCountMismatch`] if `index` is out of range
    /// and [`Error::ArgumentTypeMismatch`] if the method signature does not
    /// accept `value` at that position.
    pub fn set_argument(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mut arguments = self.arguments.borrow_mut();
        if index >= arguments.len() {
            return Err(Error::ArgumentCountMismatch {
                selector: self.selector.name().to_string(),
                expected: arguments.len(),
                got: index + 1,
            });
        }
        self.trampoline
            .signature()
            .check_argument(&self.selector, index, &value)?;
        arguments[index] = value;
        Ok(())
    }

    /// Runs the original implementation with the current arguments.
    ///
    /// The result becomes the call's return value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OriginalUnavailable`] during the Before phase, or
    /// whatever the original implementation fails with.
    pub fn invoke_original(&self) -> Result<Value> {
        if self.phase.get() == Phase::Before {
            return Err(Error::OriginalUnavailable {
                selector: self.selector.name().to_string(),
            });
        }

        let arguments = self.arguments();
        let value = self.trampoline.call_original(&self.receiver, &arguments)?;
        self.invocations.set(self.invocations.get() + 1);
        *self.return_value.borrow_mut() = value.clone();
        Ok(value)
    }

    /// How many times the original has run during this call.
    #[must_use]
    pub fn original_invocation_count(&self) -> u32 {
        self.invocations.get()
    }

    /// The value the call will return.
    #[must_use]
    pub fn return_value(&self) -> Value {
        self.return_value.borrow().clone()
    }

    /// Overrides the value the call will return.
    pub fn set_return_value(&self, value: impl Into<Value>) {
        *self.return_value.borrow_mut() = value.into();
    }

    pub(crate) fn into_return_value(self) -> Value {
        self.return_value.into_inner()
    }
}

impl fmt::Debug for AspectObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectObject")
            .field("receiver", &self.receiver)
            .field("selector", &self.selector)
            .field("arguments", &self.arguments.borrow())
            .field("phase", &self.phase.get())
            .finish_non_exhaustive()
    }
}
