//! Boxed argument and return values.
//!
//! Method implementations, the dispatcher and hook callbacks all exchange
//! arguments as `&[Value]`. Each variant keeps the dynamic type of the value
//! it carries so that hook callbacks can inspect captured arguments without
//! knowing the method signature up front.

use crate::runtime::{Class, Object, Selector};
use std::fmt;
use std::sync::Arc;

/// A reference-counted closure passed as an argument (`@?` encoding).
///
/// Blocks compare by identity: two clones of the same block are equal, two
/// separately created blocks never are.
#[derive(Clone)]
pub struct Block(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Block {
    /// Wraps a closure as a block value.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Block(Arc::new(f))
    }

    /// Calls the block.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// A dynamically typed argument or return value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// No value (`v` return).
    #[default]
    Void,
    /// Absent object, class, selector or string.
    Nil,
    /// `B`
    Bool(bool),
    /// Signed integers (`c`, `s`, `i`, `l`, `q`).
    Int(i64),
    /// Unsigned integers (`C`, `S`, `I`, `L`, `Q`).
    UInt(u64),
    /// `f` and `d`.
    Float(f64),
    /// Text, passed as `*` or `@`.
    Str(Arc<str>),
    /// An object reference.
    Object(Object),
    /// A class reference (`#`).
    Class(Class),
    /// A selector (`:`).
    Selector(Selector),
    /// Opaque pointer-like value (`^`).
    Pointer(usize),
    /// Composite value laid out field by field (`{Name=...}`).
    Struct(Vec<Value>),
    /// Fixed-size or object array.
    Array(Vec<Value>),
    /// Closure argument.
    Block(Block),
}

impl Value {
    /// Short name of the variant, used in type mismatch errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
            Value::Selector(_) => "selector",
            Value::Pointer(_) => "pointer",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Block(_) => "block",
        }
    }

    /// Creates a text value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Returns `true` for `Nil` and `Void`.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Void)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64`, converting from `UInt` when it fits.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Returns the value as `u64`, converting from non-negative `Int`.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_class(&self) -> Option<Class> {
        match self {
            Value::Class(c) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_selector(&self) -> Option<Selector> {
        match self {
            Value::Selector(s) => Some(*s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pointer(&self) -> Option<usize> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns the fields of a `Struct` or the elements of an `Array`.
    #[must_use]
    pub fn as_fields(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(fields) | Value::Array(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::UInt(u64::from(u))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Value::Object(o.clone())
    }
}

impl From<Class> for Value {
    fn from(c: Class) -> Self {
        Value::Class(c)
    }
}

impl From<Selector> for Value {
    fn from(s: Selector) -> Self {
        Value::Selector(s)
    }
}

impl From<Block> for Value {
    fn from(b: Block) -> Self {
        Value::Block(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}
