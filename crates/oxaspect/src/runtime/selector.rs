//! `Selector` interning for the `oxaspect` runtime.
//!
//! Each unique method name maps to exactly one interned selector that lives
//! for the rest of the program. Equality is pointer equality and the hash is
//! computed once at interning time, so selectors are cheap keys for method
//! tables and the hook table alike.
//!
//! # Thread Safety
//!
//! The registry is guarded by an `RwLock`; lookups of existing selectors only
//! take the read lock.

use crate::error::{Error, Result};
use crate::runtime::{read_lock, write_lock};
use fxhash::{FxHashMap, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{LazyLock, RwLock};

/// Interned selector data. Leaked on creation, never freed.
struct InternedSelector {
    name: Box<str>,
    hash: u64,
}

static REGISTRY: LazyLock<RwLock<FxHashMap<&'static str, &'static InternedSelector>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// `Selector` represents a unique method name in the runtime.
///
/// # Example
///
/// ```rust
/// use oxaspect::Selector;
/// use std::str::FromStr;
///
/// let a = Selector::from_str("buy:price:count:").unwrap();
/// let b = Selector::from_str("buy:price:count:").unwrap();
///
/// assert_eq!(a, b);
/// assert_eq!(a.arg_count(), 3);
/// ```
#[derive(Clone, Copy)]
pub struct Selector {
    inner: &'static InternedSelector,
}

impl FromStr for Selector {
    type Err = Error;

    /// Returns the interned selector for `name`, interning it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] for an empty or whitespace-containing
    /// name.
    fn from_str(name: &str) -> Result<Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidSelector {
                name: name.to_string(),
            });
        }

        if let Some(inner) = read_lock(&REGISTRY).get(name).copied() {
            return Ok(Selector { inner });
        }

        let mut registry = write_lock(&REGISTRY);
        // Another thread may have interned it between the two locks.
        if let Some(inner) = registry.get(name).copied() {
            return Ok(Selector { inner });
        }

        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        let inner: &'static InternedSelector = Box::leak(Box::new(InternedSelector {
            name: name.into(),
            hash: hasher.finish(),
        }));
        registry.insert(&*inner.name, inner);

        Ok(Selector { inner })
    }
}

impl Selector {
    /// Returns the selector name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        &self.inner.name
    }

    /// Returns the precomputed hash of the name.
    #[must_use]
    pub fn hash_value(&self) -> u64 {
        self.inner.hash
    }

    /// Number of arguments implied by the name (one per `:`).
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.inner.name.matches(':').count()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for Selector {}

impl Hash for Selector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.inner.hash);
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.name())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
