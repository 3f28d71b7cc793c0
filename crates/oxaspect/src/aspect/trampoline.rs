//! The interception stub placed in a method table.
//!
//! One `Trampoline` exists per hooked (host class, selector) pair. On each
//! call it:
//!
//! 1. Passes straight through to the original if a more derived class
//!    between the receiver's dispatch class and the host also has a
//!    trampoline for the selector, so one call never fires two chains
//! 2. Reads the current chain snapshot
//! 3. Runs the Before records in registration order
//! 4. Runs the most recent Instead record, or the original if there is none
//! 5. Runs the After records in registration order
//! 6. Returns the captured return value
//!
//! A callback error aborts the remaining steps and propagates to the sender.
//!
//! # Thread Safety
//!
//! The chain is an `Arc` snapshot behind a `RwLock`. A call clones the `Arc`
//! and drops the lock before running any callback, so concurrent edits never
//! change the records an in-flight call runs.

use crate::aspect::capture::{AspectObject, Phase};
use crate::aspect::record::HookChain;
use crate::aspect::resolver;
use crate::error::Result;
use crate::runtime::{Class, Imp, Receiver, Selector, Signature, Value, read_lock, write_lock};
use oxaspect_log::trace;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Where the behavior a trampoline wraps comes from.
#[derive(Clone)]
pub(crate) enum Original {
    /// The host declared the method itself; this is its implementation.
    Declared(Imp),
    /// The host inherited the method; resolved from the superclass on
    /// every call so later ancestor changes stay visible.
    Inherited,
    /// Nothing implements the selector; returns the default value.
    Stub,
}

impl fmt::Debug for Original {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Original::Declared(_) => f.write_str("Declared"),
            Original::Inherited => f.write_str("Inherited"),
            Original::Stub => f.write_str("Stub"),
        }
    }
}

/// Interception stub for one (host class, selector) pair.
pub struct Trampoline {
    host: Class,
    selector: Selector,
    signature: Arc<Signature>,
    original: Original,
    chain: RwLock<Arc<HookChain>>,
}

impl Trampoline {
    pub(crate) fn new(host: Class, selector: Selector, signature: Arc<Signature>, original: Original) -> Self {
        Trampoline {
            host,
            selector,
            signature,
            original,
            chain: RwLock::new(Arc::new(HookChain::default())),
        }
    }

    /// The class whose method table holds this trampoline.
    #[must_use]
    pub fn host(&self) -> Class {
        self.host
    }

    #[must_use]
    pub fn selector(&self) -> Selector {
        self.selector
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns `true` if no implementation existed when the hook was installed.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        matches!(self.original, Original::Stub)
    }

    /// Number of hooks currently in the chain.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.snapshot().len()
    }

    pub(crate) fn snapshot(&self) -> Arc<HookChain> {
        Arc::clone(&read_lock(&self.chain))
    }

    pub(crate) fn replace_chain(&self, chain: HookChain) {
        *write_lock(&self.chain) = Arc::new(chain);
    }

    pub(crate) fn invoke(self: &Arc<Self>, receiver: &Receiver, args: &[Value]) -> Result<Value> {
        if resolver::shadowed_below(&receiver.dispatch_class(), &self.host, &self.selector) {
            trace!("descendant trampoline owns this call, passing through"; selector = self.selector, host = self.host);
            return self.call_original(receiver, args);
        }

        let chain = self.snapshot();
        if chain.is_empty() {
            return self.call_original(receiver, args);
        }

        trace!("running hook chain"; selector = self.selector, host = self.host, hooks = chain.len());
        let call = AspectObject::new(receiver.clone(), args.to_vec(), Arc::clone(self));

        for record in chain.before() {
            record.callback().call(&call)?;
        }

        match chain.instead() {
            Some(record) => {
                call.set_phase(Phase::Instead);
                record.callback().call(&call)?;
            }
            None => {
                call.set_phase(Phase::Original);
                call.invoke_original()?;
            }
        }

        call.set_phase(Phase::After);
        for record in chain.after() {
            record.callback().call(&call)?;
        }

        Ok(call.into_return_value())
    }

    /// Runs the wrapped behavior without any hooks.
    pub(crate) fn call_original(&self, receiver: &Receiver, args: &[Value]) -> Result<Value> {
        match &self.original {
            Original::Declared(imp) => imp(receiver, &self.selector, args),
            Original::Inherited => {
                let inherited = self
                    .host
                    .super_class()
                    .and_then(|parent| parent.lookup_method_cached(&self.selector));
                match inherited {
                    Some(method) => method.implementation.invoke(receiver, &self.selector, args),
                    None => Ok(self.signature.return_type().default_value()),
                }
            }
            Original::Stub => Ok(self.signature.return_type().default_value()),
        }
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("host", &self.host.name())
            .field("selector", &self.selector)
            .field("original", &self.original)
            .field("hooks", &self.hook_count())
            .finish()
    }
}
