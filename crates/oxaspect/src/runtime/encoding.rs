//! Type encodings for method signatures.
//!
//! Every method carries a signature written in an `@encode`-style string:
//! the return type first, then `self` (`@`), then `_cmd` (`:`), then one
//! code per explicit argument. The parsed form is used to validate the
//! arguments of a send and to produce a default return value for stubs and
//! for Instead hooks that never set one.
//!
//! # Encoding Format
//!
//! - `v` - void
//! - `@` - object
//! - `#` - class
//! - `:` - selector
//! - `B` - bool
//! - `c` `s` `i` `l` `q` - signed integers
//! - `C` `S` `I` `L` `Q` - unsigned integers
//! - `f` `d` - floating point
//! - `*` - C string
//! - `^T` - pointer to `T` (a bare trailing `^` is an untyped pointer)
//! - `{Name=T...}` - struct with fields `T...`
//! - `[NT]` - array of `N` elements of type `T`
//! - `@?` - block
//! - `?` - unknown, accepts anything
//!
//! Digits following a top-level type (frame offsets, as in `v24@0:8`) are
//! accepted and ignored.

use crate::error::{Error, Result};
use crate::runtime::{Selector, Value};
use std::fmt;

/// One parsed type code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCode {
    Void,
    Object,
    Class,
    Selector,
    Bool,
    /// Signed integer; the char is the original code (`c`, `s`, `i`, `l`, `q`).
    Signed(char),
    /// Unsigned integer; the char is the original code (`C`, `S`, `I`, `L`, `Q`).
    Unsigned(char),
    Float,
    Double,
    CString,
    Pointer(Box<TypeCode>),
    Struct {
        name: String,
        fields: Vec<TypeCode>,
    },
    Array {
        len: usize,
        element: Box<TypeCode>,
    },
    Block,
    Unknown,
}

impl TypeCode {
    /// Checks whether `value` can be passed where this type is expected.
    ///
    /// Reference-like types (objects, classes, selectors, strings, pointers
    /// and blocks) also accept [`Value::Nil`].
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeCode::Unknown, _)
            | (TypeCode::Void, Value::Void)
            | (TypeCode::Bool, Value::Bool(_))
            | (TypeCode::Signed(_), Value::Int(_))
            | (TypeCode::Unsigned(_), Value::UInt(_))
            | (TypeCode::Float | TypeCode::Double, Value::Float(_))
            | (
                TypeCode::Object,
                Value::Object(_)
                | Value::Class(_)
                | Value::Str(_)
                | Value::Array(_)
                | Value::Block(_),
            )
            | (TypeCode::Class, Value::Class(_))
            | (TypeCode::Selector, Value::Selector(_))
            | (TypeCode::CString, Value::Str(_))
            | (TypeCode::Pointer(_), Value::Pointer(_))
            | (TypeCode::Block, Value::Block(_)) => true,
            (TypeCode::Unsigned(_), Value::Int(i)) => *i >= 0,
            (
                TypeCode::Object
                | TypeCode::Class
                | TypeCode::Selector
                | TypeCode::CString
                | TypeCode::Pointer(_)
                | TypeCode::Block,
                Value::Nil,
            ) => true,
            (TypeCode::Struct { fields, .. }, Value::Struct(values)) => {
                fields.len() == values.len()
                    && fields.iter().zip(values).all(|(t, v)| t.accepts(v))
            }
            (TypeCode::Array { len, element }, Value::Array(values)) => {
                *len == values.len() && values.iter().all(|v| element.accepts(v))
            }
            _ => false,
        }
    }

    /// Returns the zero value of this type.
    ///
    /// This is what a stub returns and what an Instead hook returns when it
    /// neither calls the original nor sets a return value.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            TypeCode::Void => Value::Void,
            TypeCode::Bool => Value::Bool(false),
            TypeCode::Signed(_) => Value::Int(0),
            TypeCode::Unsigned(_) => Value::UInt(0),
            TypeCode::Float | TypeCode::Double => Value::Float(0.0),
            TypeCode::Pointer(_) => Value::Pointer(0),
            TypeCode::Struct { fields, .. } => {
                Value::Struct(fields.iter().map(TypeCode::default_value).collect())
            }
            TypeCode::Array { len, element } => Value::Array(vec![element.default_value(); *len]),
            TypeCode::Object
            | TypeCode::Class
            | TypeCode::Selector
            | TypeCode::CString
            | TypeCode::Block
            | TypeCode::Unknown => Value::Nil,
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCode::Void => f.write_str("v"),
            TypeCode::Object => f.write_str("@"),
            TypeCode::Class => f.write_str("#"),
            TypeCode::Selector => f.write_str(":"),
            TypeCode::Bool => f.write_str("B"),
            TypeCode::Signed(c) | TypeCode::Unsigned(c) => write!(f, "{c}"),
            TypeCode::Float => f.write_str("f"),
            TypeCode::Double => f.write_str("d"),
            TypeCode::CString => f.write_str("*"),
            TypeCode::Pointer(target) => match **target {
                TypeCode::Unknown => f.write_str("^"),
                ref inner => write!(f, "^{inner}"),
            },
            TypeCode::Struct { name, fields } => {
                write!(f, "{{{name}=")?;
                for field in fields {
                    write!(f, "{field}")?;
                }
                f.write_str("}")
            }
            TypeCode::Array { len, element } => write!(f, "[{len}{element}]"),
            TypeCode::Block => f.write_str("@?"),
            TypeCode::Unknown => f.write_str("?"),
        }
    }
}

/// A parsed method signature.
///
/// # Example
///
/// ```
/// use oxaspect::runtime::encoding::{Signature, TypeCode};
///
/// let sig = Signature::parse("v@:*dq").unwrap();
/// assert_eq!(sig.return_type(), &TypeCode::Void);
/// assert_eq!(sig.arguments().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    encoding: Box<str>,
    return_type: TypeCode,
    arguments: Vec<TypeCode>,
    variadic: bool,
}

impl Signature {
    /// Parses a full method encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if the string contains an unknown
    /// type code, an unterminated struct or array, or does not start with a
    /// return type followed by `@` and `:`.
    pub fn parse(encoding: &str) -> Result<Self> {
        let invalid = || Error::InvalidEncoding {
            encoding: encoding.to_string(),
        };

        let chars: Vec<char> = encoding.chars().collect();
        let mut pos = 0;
        let mut types = Vec::new();
        while pos < chars.len() {
            types.push(parse_type(&chars, &mut pos).ok_or_else(invalid)?);
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }

        if types.len() < 3 || types[1] != TypeCode::Object || types[2] != TypeCode::Selector {
            return Err(invalid());
        }

        let mut types = types.into_iter();
        let return_type = types.next().ok_or_else(invalid)?;
        Ok(Signature {
            encoding: encoding.into(),
            return_type,
            arguments: types.skip(2).collect(),
            variadic: false,
        })
    }

    /// A signature that accepts any arguments and returns `return_type`.
    ///
    /// Used for stub implementations of selectors nothing declares.
    #[must_use]
    pub fn variadic(return_type: TypeCode) -> Self {
        Signature {
            encoding: format!("{return_type}@:").into(),
            return_type,
            arguments: Vec::new(),
            variadic: true,
        }
    }

    /// The encoding string this signature was parsed from.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    #[must_use]
    pub fn return_type(&self) -> &TypeCode {
        &self.return_type
    }

    /// Explicit argument types, excluding `self` and `_cmd`.
    #[must_use]
    pub fn arguments(&self) -> &[TypeCode] {
        &self.arguments
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Validates the arguments of a send against this signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentCountMismatch`] or
    /// [`Error::ArgumentTypeMismatch`]. Variadic signatures accept anything.
    pub fn check_arguments(&self, selector: &Selector, args: &[Value]) -> Result<()> {
        if self.variadic {
            return Ok(());
        }

        if args.len() != self.arguments.len() {
            return Err(Error::ArgumentCountMismatch {
                selector: selector.name().to_string(),
                expected: self.arguments.len(),
                got: args.len(),
            });
        }

        for (index, (expected, value)) in self.arguments.iter().zip(args).enumerate() {
            if !expected.accepts(value) {
                return Err(Error::ArgumentTypeMismatch {
                    selector: selector.name().to_string(),
                    index,
                    expected: expected.to_string(),
                    got: value.kind(),
                });
            }
        }

        Ok(())
    }

    /// Checks a single argument, used when a hook rewrites one in place.
    ///
    /// # Errors
    ///
    /// Same as [`Signature::check_arguments`], for one index.
    pub fn check_argument(&self, selector: &Selector, index: usize, value: &Value) -> Result<()> {
        if self.variadic {
            return Ok(());
        }

        let Some(expected) = self.arguments.get(index) else {
            return Err(Error::ArgumentCountMismatch {
                selector: selector.name().to_string(),
                expected: self.arguments.len(),
                got: index + 1,
            });
        };

        if expected.accepts(value) {
            Ok(())
        } else {
            Err(Error::ArgumentTypeMismatch {
                selector: selector.name().to_string(),
                index,
                expected: expected.to_string(),
                got: value.kind(),
            })
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding)
    }
}

/// Validates a method encoding without keeping the parsed form.
///
/// # Errors
///
/// See [`Signature::parse`].
pub fn validate_encoding(encoding: &str) -> Result<()> {
    Signature::parse(encoding).map(|_| ())
}

fn parse_type(chars: &[char], pos: &mut usize) -> Option<TypeCode> {
    let c = *chars.get(*pos)?;
    *pos += 1;

    let code = match c {
        'v' => TypeCode::Void,
        '@' if chars.get(*pos) == Some(&'?') => {
            *pos += 1;
            TypeCode::Block
        }
        '@' => TypeCode::Object,
        '#' => TypeCode::Class,
        ':' => TypeCode::Selector,
        'B' => TypeCode::Bool,
        'c' | 's' | 'i' | 'l' | 'q' => TypeCode::Signed(c),
        'C' | 'S' | 'I' | 'L' | 'Q' => TypeCode::Unsigned(c),
        'f' => TypeCode::Float,
        'd' => TypeCode::Double,
        '*' => TypeCode::CString,
        '?' => TypeCode::Unknown,
        '^' => match chars.get(*pos) {
            None => TypeCode::Pointer(Box::new(TypeCode::Unknown)),
            Some(next) if next.is_ascii_digit() => TypeCode::Pointer(Box::new(TypeCode::Unknown)),
            Some(_) => TypeCode::Pointer(Box::new(parse_type(chars, pos)?)),
        },
        '{' => {
            let mut name = String::new();
            loop {
                match *chars.get(*pos)? {
                    '=' => {
                        *pos += 1;
                        break;
                    }
                    '}' => break,
                    ch => {
                        name.push(ch);
                        *pos += 1;
                    }
                }
            }
            let mut fields = Vec::new();
            while *chars.get(*pos)? != '}' {
                fields.push(parse_type(chars, pos)?);
            }
            *pos += 1;
            TypeCode::Struct { name, fields }
        }
        '[' => {
            let start = *pos;
            while chars.get(*pos)?.is_ascii_digit() {
                *pos += 1;
            }
            let len: usize = chars[start..*pos].iter().collect::<String>().parse().ok()?;
            let element = parse_type(chars, pos)?;
            if *chars.get(*pos)? != ']' {
                return None;
            }
            *pos += 1;
            TypeCode::Array {
                len,
                element: Box::new(element),
            }
        }
        _ => return None,
    };

    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_simple_signatures() {
        let sig = Signature::parse("v@:").unwrap();
        assert_eq!(sig.return_type(), &TypeCode::Void);
        assert!(sig.arguments().is_empty());

        let sig = Signature::parse("B@:*dq").unwrap();
        assert_eq!(sig.return_type(), &TypeCode::Bool);
        assert_eq!(
            sig.arguments(),
            &[TypeCode::CString, TypeCode::Double, TypeCode::Signed('q')]
        );
    }

    #[test]
    fn test_parse_composite_types() {
        let sig = Signature::parse("v@:{CGSize=dd}@?^i[4C]").unwrap();
        let args = sig.arguments();

        assert_eq!(
            args[0],
            TypeCode::Struct {
                name: "CGSize".into(),
                fields: vec![TypeCode::Double, TypeCode::Double],
            }
        );
        assert_eq!(args[1], TypeCode::Block);
        assert_eq!(args[2], TypeCode::Pointer(Box::new(TypeCode::Signed('i'))));
        assert_eq!(
            args[3],
            TypeCode::Array {
                len: 4,
                element: Box::new(TypeCode::Unsigned('C')),
            }
        );
        assert_eq!(sig.arguments()[0].to_string(), "{CGSize=dd}");
    }

    #[test]
    fn test_parse_ignores_frame_offsets() {
        let sig = Signature::parse("v24@0:8q16").unwrap();
        assert_eq!(sig.arguments(), &[TypeCode::Signed('q')]);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(Signature::parse("").is_err());
        assert!(Signature::parse("v").is_err());
        assert!(Signature::parse("v:@").is_err());
        assert!(Signature::parse("v@:x").is_err());
        assert!(Signature::parse("v@:{CGSize=dd").is_err());
        assert!(Signature::parse("v@:[4").is_err());
        assert!(validate_encoding("i@:i").is_ok());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(TypeCode::Void.default_value(), Value::Void);
        assert_eq!(TypeCode::Object.default_value(), Value::Nil);
        assert_eq!(TypeCode::Signed('q').default_value(), Value::Int(0));
        assert_eq!(TypeCode::Bool.default_value(), Value::Bool(false));

        let size = Signature::parse("{CGSize=dd}@:").unwrap();
        assert_eq!(
            size.return_type().default_value(),
            Value::Struct(vec![Value::Float(0.0), Value::Float(0.0)])
        );
    }

    #[test]
    fn test_check_arguments() {
        let sel = Selector::from_str("buy:price:count:").unwrap();
        let sig = Signature::parse("v@:*dq").unwrap();

        assert!(
            sig.check_arguments(&sel, &["MacBook".into(), 10000.23.into(), 2.into()])
                .is_ok()
        );
        assert!(matches!(
            sig.check_arguments(&sel, &["MacBook".into()]),
            Err(Error::ArgumentCountMismatch { expected: 3, got: 1, .. })
        ));
        assert!(matches!(
            sig.check_arguments(&sel, &["MacBook".into(), 2.into(), 2.into()]),
            Err(Error::ArgumentTypeMismatch { index: 1, got: "int", .. })
        ));
        assert!(sig.check_arguments(&sel, &[Value::Nil, 1.5.into(), 0.into()]).is_ok());
    }

    #[test]
    fn test_variadic_accepts_anything() {
        let sel = Selector::from_str("anything:").unwrap();
        let sig = Signature::variadic(TypeCode::Void);

        assert!(sig.is_variadic());
        assert_eq!(sig.encoding(), "v@:");
        assert!(sig.check_arguments(&sel, &[1.into(), "x".into()]).is_ok());
        assert!(sig.check_argument(&sel, 9, &Value::Nil).is_ok());
    }
}
