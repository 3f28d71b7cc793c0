//! Per-instance isolation subclasses.
//!
//! Hooking a single instance moves it onto a private subclass of its current
//! dispatch class, named `<Declared>_OxAspect_<id>`. Trampolines for that
//! instance live on the private class, so other instances are untouched.
//! The instance still reports its declared class for every identity query.
//!
//! Classes are never freed, so the isolation class of an instance is cached
//! for as long as the instance lives. When the last instance hook goes away
//! the instance is pointed back at its pre-isolation class; hooking it again
//! re-uses the cached class. Resetting the table releases every instance but
//! keeps the cache. Entries for dropped instances are pruned the next time
//! any instance is isolated.

use crate::error::{Error, Result};
use crate::runtime::{Class, Object, WeakObject};
use fxhash::FxHashMap;
use oxaspect_log::debug;

/// Infix of generated isolation class names.
pub const ISOLATION_INFIX: &str = "_OxAspect_";

#[derive(Debug)]
struct IsolationEntry {
    class: Class,
    parent: Class,
    object: WeakObject,
}

/// Tracks the isolation class of every isolated instance, keyed by object id.
#[derive(Debug, Default)]
pub(crate) struct SubclassManager {
    entries: FxHashMap<u64, IsolationEntry>,
}

impl SubclassManager {
    /// Moves `object` onto its isolation class and returns that class.
    ///
    /// Idempotent: an already isolated instance keeps its class.
    pub(crate) fn isolate(&mut self, object: &Object) -> Result<Class> {
        self.prune();

        if let Some(entry) = self.entries.get(&object.id()) {
            if object.dispatch_class() != entry.class {
                object.set_dispatch_class(entry.class);
                debug!("re-activated isolation class"; class = entry.class, object = object.id());
            }
            return Ok(entry.class);
        }

        let parent = object.dispatch_class();
        if parent.is_sealed() {
            return Err(Error::UnsupportedTarget {
                class: object.class().name().to_string(),
                reason: format!("class '{}' is sealed", parent.name()),
            });
        }

        let name = format!("{}{}{}", object.class().name(), ISOLATION_INFIX, object.id());
        let class = match Class::from_name(&name) {
            Some(existing)
                if existing.is_isolation()
                    && existing.identity() == object.class()
                    && existing.super_class() == Some(parent) =>
            {
                existing
            }
            _ => Class::new_isolation(&name, &parent, object.class()).map_err(|err| {
                Error::UnsupportedTarget {
                    class: object.class().name().to_string(),
                    reason: err.to_string(),
                }
            })?,
        };

        object.set_dispatch_class(class);
        self.entries.insert(
            object.id(),
            IsolationEntry {
                class,
                parent,
                object: object.downgrade(),
            },
        );
        debug!("isolated instance"; class = class, parent = parent, object = object.id());
        Ok(class)
    }

    /// The isolation class of `object`, if it has one.
    pub(crate) fn isolation_class(&self, object: &Object) -> Option<Class> {
        self.entries.get(&object.id()).map(|entry| entry.class)
    }

    /// Points the instance owning `class` back at its pre-isolation class.
    pub(crate) fn release(&mut self, class: &Class) {
        let Some(entry) = self.entries.values().find(|entry| entry.class == *class) else {
            return;
        };
        if let Some(object) = entry.object.upgrade()
            && object.dispatch_class() == entry.class
        {
            object.set_dispatch_class(entry.parent);
            debug!("restored instance dispatch class"; class = entry.parent, object = object.id());
        }
    }

    /// Releases every live instance. Entries stay cached for re-isolation.
    pub(crate) fn clear(&mut self) {
        self.prune();
        let classes: Vec<Class> = self.entries.values().map(|entry| entry.class).collect();
        for class in &classes {
            self.release(class);
        }
    }

    fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.object.is_alive());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
