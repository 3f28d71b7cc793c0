//! Decides which class hosts the trampoline for a hook request.
//!
//! - Class scope: the class itself, unless the selector exists only as a
//!   class method, in which case the metaclass hosts it.
//! - Instance scope: the instance's isolation subclass, created on demand.
//!
//! The resolver also classifies where the original behavior comes from:
//! declared on the host, inherited from an ancestor, or absent (stub).
//!
//! # Hierarchy Rule
//!
//! Hooks on an ancestor and on a descendant for the same selector may both
//! be installed. At call time only the trampoline nearest to the receiver's
//! dispatch class fires; the others pass through (see [`shadowed_below`]).

use crate::aspect::record::{Target, TargetDescriptor};
use crate::aspect::subclass::SubclassManager;
use crate::error::Result;
use crate::runtime::{Class, Method, Selector, Signature, TypeCode};
use std::sync::Arc;

/// Where the original behavior of a host's selector comes from.
#[derive(Debug, Clone)]
pub(crate) enum Origin {
    /// The host defines the method; this entry is restored on removal.
    Declared(Method),
    /// An ancestor defines the method.
    Inherited,
    /// Nothing defines it.
    Absent,
    /// The host already carries a trampoline for the selector.
    Installed,
}

#[derive(Debug)]
pub(crate) struct Resolution {
    pub host: Class,
    pub descriptor: TargetDescriptor,
    pub origin: Origin,
    pub signature: Arc<Signature>,
    /// Nearest ancestor of the host already hooked for the same selector.
    pub shadowed_ancestor: Option<Class>,
}

/// Resolves a hook request, isolating the instance for instance scope.
pub(crate) fn resolve(
    target: &Target,
    selector: &Selector,
    subclasses: &mut SubclassManager,
) -> Result<Resolution> {
    let host = match target {
        Target::Class(class) => class_host(class, selector),
        Target::Instance(obj) => subclasses.isolate(obj)?,
    };

    let origin = match host.local_method(selector) {
        Some(method) if method.is_hooked() => Origin::Installed,
        Some(method) => Origin::Declared(method),
        None if host.lookup_method(selector).is_some() => Origin::Inherited,
        None => Origin::Absent,
    };

    let signature = match &origin {
        Origin::Declared(method) => Arc::clone(&method.signature),
        _ => host
            .lookup_method(selector)
            .map(|method| method.signature)
            .or_else(|| host.declared_signature(selector))
            .unwrap_or_else(|| Arc::new(Signature::variadic(TypeCode::Void))),
    };

    let shadowed_ancestor = host
        .super_class()
        .and_then(|parent| parent.ancestors().find(|c| c.has_local_trampoline(selector)));

    Ok(Resolution {
        host,
        descriptor: target.descriptor(),
        origin,
        signature,
        shadowed_ancestor,
    })
}

/// Host for a class-scope request.
pub(crate) fn class_host(class: &Class, selector: &Selector) -> Class {
    if class.is_metaclass()
        || class.instances_respond_to(selector)
        || class.declared_signature(selector).is_some()
    {
        return *class;
    }

    let meta = class.metaclass();
    if meta.lookup_method(selector).is_some() || meta.declared_signature(selector).is_some() {
        meta
    } else {
        *class
    }
}

/// Host an existing installation for `target` would live on, without
/// creating anything.
pub(crate) fn existing_host(
    target: &Target,
    selector: &Selector,
    subclasses: &SubclassManager,
) -> Option<Class> {
    match target {
        Target::Class(class) => Some(class_host(class, selector)),
        Target::Instance(obj) => subclasses.isolation_class(obj),
    }
}

/// Checks whether a class strictly between `dispatch_class` (inclusive) and
/// `host` (exclusive) carries its own trampoline for `selector`.
///
/// When it does, that trampoline already ran the chain for this call and the
/// host's trampoline must pass through.
pub(crate) fn shadowed_below(dispatch_class: &Class, host: &Class, selector: &Selector) -> bool {
    let mut current = *dispatch_class;
    while current != *host {
        if current.has_local_trampoline(selector) {
            return true;
        }
        match current.super_class() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
    false
}
