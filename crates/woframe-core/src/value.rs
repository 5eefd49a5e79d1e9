#![forbid(unsafe_code)]

//! Dynamic values flowing through bindings.
//!
//! Templates bind element attributes to arbitrary object graphs without
//! static types, so everything that crosses an association is a [`Value`].
//! Shared, mutable objects (components, sessions) travel as
//! [`Value::Object`] handles that implement [`KeyValueCoding`].
//!
//! # Coercion
//!
//! The primitive accessors never fail. Widgets read partially bound
//! templates all the time, so missing or odd values degrade to
//! `false` / `0` / `None` instead of erroring:
//!
//! | Value | `bool_value` | `int_value` | `string_value` |
//! |-------|--------------|-------------|----------------|
//! | `Null` | `false` | `0` | `None` |
//! | `Str("")` | `false` | `0` | `Some("")` |
//! | `Str("no")` | `false` | `0` | `Some("no")` |
//! | `Str("42")` | `true` | `42` | `Some("42")` |
//! | `Float(2.9)` | `true` | `2` | `Some("2.9")` |
//! | `List([])` | `false` | `0` | `Some("")` |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::kvc::KeyValueCoding;

/// Shared handle to an object that participates in key-value coding.
pub type ObjectRef = Arc<dyn KeyValueCoding + Send + Sync>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A shared object addressed through key-value coding.
    Object(ObjectRef),
}

/// String spellings that coerce to `false`.
const FALSY_STRINGS: &[&str] = &["", "0", "false", "no", "off", "nil", "null"];

impl Value {
    /// Wrap a shared object.
    pub fn object<T>(object: Arc<T>) -> Self
    where
        T: KeyValueCoding + Send + Sync + 'static,
    {
        Self::Object(object)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for `Null`, empty strings and empty collections.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn bool_value(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => {
                let trimmed = s.trim();
                !FALSY_STRINGS
                    .iter()
                    .any(|falsy| trimmed.eq_ignore_ascii_case(falsy))
            }
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Object(_) => true,
        }
    }

    pub fn int_value(&self) -> i64 {
        match self {
            Self::Null | Self::List(_) | Self::Map(_) | Self::Object(_) => 0,
            Self::Bool(b) => i64::from(*b),
            Self::Int(i) => *i,
            Self::Float(f) if f.is_finite() => *f as i64,
            Self::Float(_) => 0,
            Self::Str(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .filter(|f| f.is_finite())
                            .map(|f| f as i64)
                    })
                    .unwrap_or(0)
            }
        }
    }

    /// String form of the value; `None` only for `Null`.
    pub fn string_value(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Str(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Interpret the value as a list for iteration.
    ///
    /// Lists are returned as-is, maps yield their values in key order,
    /// `Null` yields `None`, and any other value is treated as a
    /// single-element list.
    pub fn to_list(&self) -> Option<Vec<Value>> {
        match self {
            Self::Null => None,
            Self::List(l) => Some(l.clone()),
            Self::Map(m) => Some(m.values().cloned().collect()),
            other => Some(vec![other.clone()]),
        }
    }

    /// Loose equality used by conditionals: numbers compare numerically,
    /// everything else by string form.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.float_value() == other.float_value()
            }
            _ if self == other => true,
            _ => self.string_value() == other.string_value(),
        }
    }

    fn float_value(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            other => other.int_value() as f64,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::Object(o) => write!(f, "Object({})", o.description()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(l) => {
                for (idx, item) in l.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(m) => {
                f.write_str("{")?;
                for (idx, (k, v)) in m.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
            Self::Object(o) => f.write_str(&o.description()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}
