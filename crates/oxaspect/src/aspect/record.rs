//! Hook records and the per-installation hook chain.
//!
//! A [`HookRecord`] is immutable once registered. A [`HookChain`] is an
//! immutable snapshot of every record for one (host class, selector) pair;
//! edits build a new chain, and the trampoline swaps the new snapshot in as a
//! whole. A call that has already read a snapshot keeps running exactly the
//! records it saw.

use crate::aspect::capture::AspectObject;
use crate::error::Result;
use crate::runtime::{Class, Object, Selector};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle of an installed hook, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    pub(crate) fn next() -> Self {
        HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Registration sequence number. Later hooks have larger values.
    #[must_use]
    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// When a callback runs relative to the original implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    /// Before the original; the original cannot be invoked yet.
    Before,
    /// In place of the original. Only the most recent Instead hook runs.
    Instead,
    /// After the original has produced its return value.
    #[default]
    After,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Position::Before => "before",
            Position::Instead => "instead",
            Position::After => "after",
        })
    }
}

/// What a hook is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every instance of the class and of its subclasses.
    Class(Class),
    /// One instance only.
    Instance(Object),
}

impl Target {
    /// Identity-only form of the target.
    #[must_use]
    pub fn descriptor(&self) -> TargetDescriptor {
        match self {
            Target::Class(class) => TargetDescriptor::Class(*class),
            Target::Instance(obj) => TargetDescriptor::Instance {
                class: obj.class(),
                object_id: obj.id(),
            },
        }
    }
}

impl From<Class> for Target {
    fn from(class: Class) -> Self {
        Target::Class(class)
    }
}

impl From<&Class> for Target {
    fn from(class: &Class) -> Self {
        Target::Class(*class)
    }
}

impl From<Object> for Target {
    fn from(obj: Object) -> Self {
        Target::Instance(obj)
    }
}

impl From<&Object> for Target {
    fn from(obj: &Object) -> Self {
        Target::Instance(obj.clone())
    }
}

/// A [`Target`] without a strong reference to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetDescriptor {
    Class(Class),
    Instance { class: Class, object_id: u64 },
}

pub type PlainCallback = dyn Fn(&AspectObject) -> Result<()> + Send + Sync;
pub type SelectorCallback = dyn Fn(&AspectObject, &Selector) -> Result<()> + Send + Sync;

/// A hook callback.
///
/// Both forms receive the captured call; the second also receives the
/// intercepted selector, which matters for hooks on
/// `doesNotRecognizeSelector:` and for callbacks shared between selectors.
#[derive(Clone)]
pub enum AspectCallback {
    Plain(Arc<PlainCallback>),
    WithSelector(Arc<SelectorCallback>),
}

impl AspectCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&AspectObject) -> Result<()> + Send + Sync + 'static,
    {
        AspectCallback::Plain(Arc::new(f))
    }

    pub fn with_selector<F>(f: F) -> Self
    where
        F: Fn(&AspectObject, &Selector) -> Result<()> + Send + Sync + 'static,
    {
        AspectCallback::WithSelector(Arc::new(f))
    }

    pub(crate) fn call(&self, aspect: &AspectObject) -> Result<()> {
        match self {
            AspectCallback::Plain(f) => f(aspect),
            AspectCallback::WithSelector(f) => f(aspect, &aspect.selector()),
        }
    }
}

impl fmt::Debug for AspectCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectCallback::Plain(_) => f.write_str("AspectCallback::Plain"),
            AspectCallback::WithSelector(_) => f.write_str("AspectCallback::WithSelector"),
        }
    }
}

/// One registered hook.
pub(crate) struct HookRecord {
    id: HookId,
    selector: Selector,
    position: Position,
    callback: AspectCallback,
    target: TargetDescriptor,
    #[cfg(feature = "hook_backtrace")]
    backtrace: backtrace::Backtrace,
}

impl HookRecord {
    pub(crate) fn new(
        selector: Selector,
        position: Position,
        callback: AspectCallback,
        target: TargetDescriptor,
    ) -> Self {
        HookRecord {
            id: HookId::next(),
            selector,
            position,
            callback,
            target,
            #[cfg(feature = "hook_backtrace")]
            backtrace: backtrace::Backtrace::new_unresolved(),
        }
    }

    pub(crate) fn id(&self) -> HookId {
        self.id
    }

    pub(crate) fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn callback(&self) -> &AspectCallback {
        &self.callback
    }

    /// Introspection snapshot of this record.
    pub(crate) fn info(&self, host: Class) -> HookInfo {
        HookInfo {
            id: self.id,
            selector: self.selector,
            position: self.position,
            target: self.target,
            host,
            #[cfg(feature = "hook_backtrace")]
            backtrace: self.backtrace.clone(),
        }
    }
}

impl fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRecord")
            .field("id", &self.id)
            .field("selector", &self.selector)
            .field("position", &self.position)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Read-only description of an installed hook.
#[derive(Clone, Debug)]
pub struct HookInfo {
    pub id: HookId,
    pub selector: Selector,
    pub position: Position,
    pub target: TargetDescriptor,
    /// The class whose method table holds the trampoline.
    pub host: Class,
    #[cfg(feature = "hook_backtrace")]
    backtrace: backtrace::Backtrace,
}

impl HookInfo {
    /// Where the hook was installed, symbolized on demand.
    #[cfg(feature = "hook_backtrace")]
    #[must_use]
    pub fn backtrace(&self) -> String {
        let mut backtrace = self.backtrace.clone();
        backtrace.resolve();
        format!("{backtrace:?}")
    }
}

/// Snapshot of every hook for one (host, selector) pair, in registration
/// order within each position.
#[derive(Clone, Default, Debug)]
pub(crate) struct HookChain {
    before: Vec<Arc<HookRecord>>,
    instead: Vec<Arc<HookRecord>>,
    after: Vec<Arc<HookRecord>>,
}

impl HookChain {
    fn list(&self, position: Position) -> &Vec<Arc<HookRecord>> {
        match position {
            Position::Before => &self.before,
            Position::Instead => &self.instead,
            Position::After => &self.after,
        }
    }

    fn list_mut(&mut self, position: Position) -> &mut Vec<Arc<HookRecord>> {
        match position {
            Position::Before => &mut self.before,
            Position::Instead => &mut self.instead,
            Position::After => &mut self.after,
        }
    }

    /// A copy of this chain with `record` appended to its position.
    pub(crate) fn with_record(&self, record: Arc<HookRecord>) -> HookChain {
        let mut chain = self.clone();
        chain.list_mut(record.position()).push(record);
        chain
    }

    /// A copy of this chain without record `id`, or `None` if absent.
    pub(crate) fn without_record(&self, id: HookId) -> Option<HookChain> {
        for position in [Position::Before, Position::Instead, Position::After] {
            if let Some(index) = self.list(position).iter().position(|r| r.id() == id) {
                let mut chain = self.clone();
                chain.list_mut(position).remove(index);
                return Some(chain);
            }
        }
        None
    }

    pub(crate) fn before(&self) -> &[Arc<HookRecord>] {
        &self.before
    }

    /// The Instead record that runs: the most recently registered one.
    pub(crate) fn instead(&self) -> Option<&Arc<HookRecord>> {
        self.instead.last()
    }

    pub(crate) fn after(&self) -> &[Arc<HookRecord>] {
        &self.after
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.before.is_empty() && self.instead.is_empty() && self.after.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.before.len() + self.instead.len() + self.after.len()
    }

    /// Every record, Before then Instead then After.
    pub(crate) fn records(&self) -> impl Iterator<Item = &Arc<HookRecord>> {
        self.before.iter().chain(&self.instead).chain(&self.after)
    }
}
