//! `OxAspect`: aspect-oriented method interception for a dynamic object runtime
//!
//! `OxAspect` lets you attach callbacks that run before, instead of, or after
//! a method, for every instance of a class or for a single instance, and
//! remove them again with the original behavior restored exactly. It
//! provides:
//!
//! - **An Objective-C style runtime** with interned selectors, classes and
//!   metaclasses, cached dynamic dispatch and typed method signatures
//! - **Class-scope hooks** covering a class, its subclasses and, when the
//!   selector is a class method, the class itself
//! - **Instance-scope hooks** through per-instance isolation subclasses that
//!   leave the instance's declared class untouched
//! - **Faithful argument capture**, including rewriting arguments and
//!   controlling whether the original runs at all
//!
//! # Architecture
//!
//! - [`runtime`]: the object model being hooked
//! - [`aspect`]: hook records, trampolines, target resolution, isolation
//!   subclasses and the process-wide hook table
//!
//! # Example
//!
//! ```rust
//! use oxaspect::{aspect, root_class, Class, Method, Object, Position, Selector, Value};
//! use std::str::FromStr;
//!
//! let dog = Class::new("LibDocDog", &root_class()).unwrap();
//! let bark = Selector::from_str("bark").unwrap();
//! dog.add_method(Method::new(&bark, "@@:", |_, _, _| Ok("woof".into())).unwrap())
//!     .unwrap();
//!
//! let quiet = Object::new(&dog);
//! let loud = Object::new(&dog);
//! aspect::hook_instance(&loud, &bark, Position::After, |call| {
//!     call.set_return_value("WOOF");
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert_eq!(quiet.send(&bark, &[]).unwrap(), Value::from("woof"));
//! assert_eq!(loud.send(&bark, &[]).unwrap(), Value::from("WOOF"));
//! assert!(loud.is_member_of(&dog));
//! ```

pub mod aspect;
pub mod error;
pub mod runtime;

// Re-export commonly used types
pub use aspect::{AspectCallback, AspectObject, HookId, HookInfo, Position, Target};
pub use error::{Error, Result};
pub use runtime::{
    Block, Class, ClassFlags, Method, Object, Receiver, Selector, Signature, TypeCode, Value,
    root_class,
};
