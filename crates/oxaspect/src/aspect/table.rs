//! The process-wide hook table.
//!
//! Maps every hooked (host class, selector) pair to its installation and
//! every [`HookId`] to the pair that holds it. All mutations go through one
//! `Mutex`; call-time reads never touch it.
//!
//! # Installation Lifecycle
//!
//! 1. The first hook for a pair swaps a fresh trampoline into the host's
//!    method table, remembering the entry it replaced.
//! 2. Further hooks only publish a new chain snapshot on that trampoline.
//! 3. Removing the last hook restores the remembered entry (or removes the
//!    local entry if there was none), so the selector dispatches exactly as
//!    before. An isolated instance with no hooks left is pointed back at its
//!    pre-isolation class.
//!
//! # Thread Safety
//!
//! The table never runs callbacks, so its mutex is never held while user
//! code runs. Hooks may be installed or removed from inside callbacks.

use crate::aspect::record::{AspectCallback, HookId, HookInfo, HookRecord, Position, Target};
use crate::aspect::resolver::{self, Origin, Resolution};
use crate::aspect::subclass::SubclassManager;
use crate::aspect::trampoline::{Original, Trampoline};
use crate::error::Result;
use crate::runtime::{Class, Implementation, Method, Object, Selector, lock};
use fxhash::FxHashMap;
use oxaspect_log::{debug, warn};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

type InstallKey = (Class, Selector);

struct Installation {
    trampoline: Arc<Trampoline>,
    /// The local entry the trampoline replaced, restored on uninstall.
    replaced: Option<Method>,
}

/// Registry of every active hook.
#[derive(Default)]
pub(crate) struct HookTable {
    installations: FxHashMap<InstallKey, Installation>,
    index: FxHashMap<HookId, InstallKey>,
    subclasses: SubclassManager,
}

static TABLE: LazyLock<Mutex<HookTable>> = LazyLock::new(|| Mutex::new(HookTable::default()));

/// Locks the global hook table.
pub(crate) fn table() -> MutexGuard<'static, HookTable> {
    lock(&TABLE)
}

impl HookTable {
    /// Registers a hook, installing a trampoline if the pair has none yet.
    pub(crate) fn install(
        &mut self,
        target: &Target,
        selector: &Selector,
        position: Position,
        callback: AspectCallback,
    ) -> Result<HookId> {
        let resolution = resolver::resolve(target, selector, &mut self.subclasses)?;
        let key = (resolution.host, *selector);

        let installation = self
            .installations
            .entry(key)
            .or_insert_with(|| Self::swap_in(&resolution, selector));

        let record = Arc::new(HookRecord::new(*selector, position, callback, resolution.descriptor));
        let id = record.id();
        let trampoline = &installation.trampoline;
        trampoline.replace_chain(trampoline.snapshot().with_record(record));
        self.index.insert(id, key);

        debug!("hook installed"; id = id, selector = selector, host = resolution.host, position = position);
        Ok(id)
    }

    fn swap_in(resolution: &Resolution, selector: &Selector) -> Installation {
        let host = resolution.host;
        let (original, replaced) = match &resolution.origin {
            Origin::Declared(method) => match &method.implementation {
                Implementation::Native(imp) => (Original::Declared(Arc::clone(imp)), Some(method.clone())),
                Implementation::Trampoline(_) => (Original::Inherited, Some(method.clone())),
            },
            Origin::Inherited | Origin::Installed => (Original::Inherited, None),
            Origin::Absent => {
                warn!("hooking a selector with no implementation, installing a stub"; selector = selector, host = host);
                (Original::Stub, None)
            }
        };

        if let Some(ancestor) = resolution.shadowed_ancestor {
            debug!("ancestor already hooked, its chain is skipped for this class"; selector = selector, host = host, ancestor = ancestor);
        }

        let trampoline = Arc::new(Trampoline::new(
            host,
            *selector,
            Arc::clone(&resolution.signature),
            original,
        ));
        host.set_local_method(Method {
            selector: *selector,
            signature: Arc::clone(&resolution.signature),
            implementation: Implementation::Trampoline(Arc::clone(&trampoline)),
        });
        debug!("trampoline installed"; selector = selector, host = host, stub = trampoline.is_stub());

        Installation { trampoline, replaced }
    }

    /// Removes one hook. Unknown ids are ignored.
    pub(crate) fn remove(&mut self, id: HookId) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };
        let Some(installation) = self.installations.get(&key) else {
            return false;
        };

        let trampoline = &installation.trampoline;
        let Some(chain) = trampoline.snapshot().without_record(id) else {
            return false;
        };

        debug!("hook removed"; id = id, selector = key.1, host = key.0);
        if chain.is_empty() {
            self.uninstall(key);
        } else {
            trampoline.replace_chain(chain);
        }
        true
    }

    fn uninstall(&mut self, key: InstallKey) {
        let (host, selector) = key;
        let Some(installation) = self.installations.remove(&key) else {
            return;
        };

        installation.trampoline.replace_chain(Default::default());
        match installation.replaced {
            Some(method) => {
                host.set_local_method(method);
            }
            None => {
                host.remove_local_method(&selector);
            }
        }
        debug!("original implementation restored"; selector = selector, host = host);

        if host.is_isolation() && !self.installations.keys().any(|(class, _)| *class == host) {
            self.subclasses.release(&host);
        }
    }

    /// Removes every hook for `selector` on `target`. Returns how many.
    pub(crate) fn remove_all(&mut self, target: &Target, selector: &Selector) -> usize {
        let ids = self.ids_for(target, selector);
        ids.into_iter().filter(|id| self.remove(*id)).count()
    }

    fn ids_for(&self, target: &Target, selector: &Selector) -> Vec<HookId> {
        resolver::existing_host(target, selector, &self.subclasses)
            .and_then(|host| self.installations.get(&(host, *selector)))
            .map(|installation| {
                installation
                    .trampoline
                    .snapshot()
                    .records()
                    .map(|record| record.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Describes the hooks for `selector` on `target`, Before then Instead
    /// then After, each in registration order.
    pub(crate) fn hooks(&self, target: &Target, selector: &Selector) -> Vec<HookInfo> {
        let Some(host) = resolver::existing_host(target, selector, &self.subclasses) else {
            return Vec::new();
        };
        self.installations
            .get(&(host, *selector))
            .map(|installation| {
                installation
                    .trampoline
                    .snapshot()
                    .records()
                    .map(|record| record.info(host))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn isolate(&mut self, object: &Object) -> Result<Class> {
        self.subclasses.isolate(object)
    }

    /// Number of (host, selector) pairs currently carrying a trampoline.
    pub(crate) fn installation_count(&self) -> usize {
        self.installations.len()
    }

    pub(crate) fn hook_count(&self) -> usize {
        self.index.len()
    }

    /// Removes every hook and restores every original.
    pub(crate) fn reset(&mut self) {
        let keys: Vec<InstallKey> = self.installations.keys().copied().collect();
        for key in keys {
            self.uninstall(key);
        }
        self.index.clear();
        self.subclasses.clear();
        debug!("hook table reset");
    }
}
