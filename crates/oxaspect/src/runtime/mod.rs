//! `OxAspect` object runtime.
//!
//! A small message-passing object model that the hook engine rewrites at
//! runtime:
//!
//! - [`selector`]: interned method names
//! - [`encoding`]: method signatures and argument validation
//! - [`value`]: dynamically typed arguments and return values
//! - [`class`]: classes, metaclasses and their method tables
//! - [`object`]: instances with a swappable dispatch class
//! - [`dispatch`]: message sending, super sends and unrecognized selectors
//!
//! # Root Class
//!
//! Every hierarchy may start at [`root_class`] (`OxObject`), which provides
//! the default `doesNotRecognizeSelector:` that turns an unknown selector
//! into [`Error::SelectorNotFound`](crate::Error::SelectorNotFound).
//!
//! # Dispatch Epoch
//!
//! Each class keeps a per-selector lookup cache. Any change to any method
//! table bumps a global epoch and every cache entry stamped with an older
//! epoch is ignored, so a hook installed on a superclass is visible through
//! subclass caches immediately.

pub mod class;
pub mod dispatch;
pub mod encoding;
pub mod object;
pub mod selector;
pub mod value;

pub use class::{Class, ClassFlags, Imp, Implementation, Method};
pub use dispatch::{MAX_DISPATCH_DEPTH, Receiver, send_class_message, send_message, send_super};
pub use encoding::{Signature, TypeCode};
pub use object::{Object, WeakObject};
pub use selector::Selector;
pub use value::{Block, Value};

use crate::error::Error;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    LazyLock, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Name of the selector sent when a receiver has no implementation.
pub const DOES_NOT_RECOGNIZE_SELECTOR: &str = "doesNotRecognizeSelector:";

/// Name of the root class.
pub const ROOT_CLASS_NAME: &str = "OxObject";

static DISPATCH_EPOCH: AtomicU64 = AtomicU64::new(0);

/// Current dispatch epoch.
pub(crate) fn dispatch_epoch() -> u64 {
    DISPATCH_EPOCH.load(Ordering::Acquire)
}

/// Invalidates every lookup cache.
pub(crate) fn bump_dispatch_epoch() {
    DISPATCH_EPOCH.fetch_add(1, Ordering::AcqRel);
}

// A panicking hook callback must not wedge the runtime. Guarded data is
// only ever replaced wholesale, so a poisoned lock still holds a usable value.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

static ROOT_CLASS: LazyLock<Class> = LazyLock::new(|| {
    let class = Class::intern_root(ROOT_CLASS_NAME);

    let result = does_not_recognize_selector().and_then(|sel| {
        let method = Method::new(&sel, "v@::", |receiver, _cmd, args| {
            let selector = args
                .first()
                .and_then(Value::as_selector)
                .map_or_else(|| "<nil>".to_string(), |s| s.name().to_string());
            Err(Error::SelectorNotFound {
                selector,
                class: receiver.class().name().to_string(),
            })
        })?;
        class.add_method(method)
    });
    if let Err(err) = result {
        oxaspect_log::error!("failed to install doesNotRecognizeSelector: on {}: {}", ROOT_CLASS_NAME, err);
    }

    class
});

/// Returns the root class `OxObject`.
///
/// Classes created with [`Class::new`] under this root inherit its default
/// `doesNotRecognizeSelector:`.
#[must_use]
pub fn root_class() -> Class {
    *ROOT_CLASS
}

/// The `doesNotRecognizeSelector:` selector.
pub(crate) fn does_not_recognize_selector() -> crate::Result<Selector> {
    Selector::from_str(DOES_NOT_RECOGNIZE_SELECTOR)
}
