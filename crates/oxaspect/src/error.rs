//! Error types for the `oxaspect` runtime and hook engine.
//!
//! One enum covers both the modeled object runtime (class registration,
//! message dispatch) and the hook engine (installation failures). Method
//! bodies and hook callbacks report their own failures as
//! [`Error::Exception`], which dispatch propagates untouched.

use thiserror::Error;

/// Errors that can occur in the `oxaspect` runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Class name already exists in registry.
    #[error("Class name already exists in registry: {name}")]
    ClassAlreadyExists {
        /// The duplicated class name.
        name: String,
    },

    /// Inheritance cycle detected.
    #[error("Inheritance cycle detected")]
    InheritanceCycle,

    /// Attempted to subclass a class that forbids subclassing.
    #[error("Class '{class}' is sealed and cannot be subclassed")]
    SealedClass {
        /// The sealed class.
        class: String,
    },

    /// Selector name is not usable.
    #[error("Invalid selector name: {name:?}")]
    InvalidSelector {
        /// The rejected name.
        name: String,
    },

    /// Invalid type encoding string.
    #[error("Invalid type encoding string: {encoding:?}")]
    InvalidEncoding {
        /// The rejected encoding.
        encoding: String,
    },

    /// Selector not found in class or inheritance chain.
    #[error("Selector '{selector}' not recognized by '{class}'")]
    SelectorNotFound {
        /// The selector that was sent.
        selector: String,
        /// Declared class of the receiver.
        class: String,
    },

    /// Argument count mismatch for method signature.
    #[error("Argument count mismatch for '{selector}': expected {expected}, got {got}")]
    ArgumentCountMismatch {
        /// The selector being sent.
        selector: String,
        /// Expected number of arguments (excluding self and _cmd).
        expected: usize,
        /// Actual number of arguments provided.
        got: usize,
    },

    /// Argument type mismatch for method signature.
    #[error("Argument type mismatch for '{selector}' at index {index}: expected '{expected}', got {got}")]
    ArgumentTypeMismatch {
        /// The selector being sent.
        selector: String,
        /// Argument index (0-based, excluding self and _cmd).
        index: usize,
        /// Expected type encoding.
        expected: String,
        /// Kind of the value that was provided.
        got: &'static str,
    },

    /// Instance-scope hook requested on a type that cannot be isolated.
    #[error("Cannot isolate an instance of '{class}': {reason}")]
    UnsupportedTarget {
        /// Declared class of the instance.
        class: String,
        /// Why the instance cannot be isolated.
        reason: String,
    },

    /// The original implementation was invoked outside the Instead/After phases.
    #[error("Original implementation of '{selector}' is not available during the before phase")]
    OriginalUnavailable {
        /// The selector being intercepted.
        selector: String,
    },

    /// Nested message sends exceeded the dispatch depth limit.
    #[error("Dispatch depth limit of {depth} exceeded while sending '{selector}'")]
    RecursionLimit {
        /// The selector that crossed the limit.
        selector: String,
        /// The configured limit.
        depth: u32,
    },

    /// Failure raised by a method body or a hook callback.
    #[error("{name}: {reason}")]
    Exception {
        /// Short failure name.
        name: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl Error {
    /// Creates an [`Error::Exception`], the failure type for method bodies
    /// and hook callbacks.
    pub fn exception(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Exception {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for `oxaspect` operations.
pub type Result<T> = std::result::Result<T, Error>;
