#![forbid(unsafe_code)]

//! Key-value coding: named property access on arbitrary objects.
//!
//! Every stateful entity (components, sessions, contexts, plain records)
//! exposes its properties through [`KeyValueCoding`]. Key paths such as
//! `customer.address.city` are resolved by the free functions in this
//! module, which only ever talk to the trait and to [`Value`] containers.
//!
//! # Unbound keys
//!
//! Implementations consult their statically known properties first and
//! then fall through to [`KeyValueCoding::handle_query_with_unbound_key`] /
//! [`KeyValueCoding::handle_take_value_for_unbound_key`]. Objects that own
//! an [`Attributes`] bag route unbound keys into it, which is what makes
//! `title` writable on a component that never declared a `title` field.
//!
//! # Invariants
//!
//! 1. Reads never fail: an unresolvable path yields [`Value::Null`].
//! 2. Writes through a `Map` segment write the modified map back to its
//!    owner, so `take_value_for_key_path(obj, v, "prefs.theme")` updates
//!    `obj.prefs` even though maps are plain values.
//! 3. Writes report failures as [`KvcError`]; callers decide whether that
//!    is fatal.

use std::any::Any;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::value::Value;

/// Errors from key-value coding writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvcError {
    /// The target does not know the key and has no unbound-key fallback.
    #[error("key '{key}' is not bound on {target}")]
    UnboundKey { key: String, target: String },
    /// A key path contained an empty segment.
    #[error("empty key in key path '{path}'")]
    EmptyKey { path: String },
    /// A key path segment resolved to something that is neither an object
    /// nor a map.
    #[error("cannot traverse '{key}' in key path '{path}'")]
    NotTraversable { key: String, path: String },
    /// The key is known but cannot be written.
    #[error("key '{key}' is read-only")]
    ReadOnly { key: String },
}

/// Named property access.
///
/// Both accessors take `&self`: objects addressed through key-value coding
/// are shared handles and use interior mutability for writes.
pub trait KeyValueCoding {
    /// Read the value for `key`.
    fn value_for_key(&self, key: &str) -> Value;

    /// Write `value` for `key`.
    fn take_value_for_key(&self, value: Value, key: &str) -> Result<(), KvcError>;

    /// Fallback for reads of keys the object does not know.
    fn handle_query_with_unbound_key(&self, _key: &str) -> Value {
        Value::Null
    }

    /// Fallback for writes of keys the object does not know.
    fn handle_take_value_for_unbound_key(&self, _value: Value, key: &str) -> Result<(), KvcError> {
        Err(KvcError::UnboundKey {
            key: key.to_owned(),
            target: self.description(),
        })
    }

    /// Short human readable description used in logs.
    fn description(&self) -> String {
        "<object>".to_owned()
    }

    /// Concrete-type access for handles that travel as [`Value::Object`].
    fn into_any(self: Arc<Self>) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Key paths
// ---------------------------------------------------------------------------

/// Read `key` from a value that is not necessarily an object.
///
/// Maps answer their entries, lists answer `count` / `@count`, strings
/// answer `length`.
pub fn value_for_key_on_value(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(object) => object.value_for_key(key),
        Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
        Value::List(list) if key == "count" || key == "@count" => Value::from(list.len()),
        Value::Str(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

/// Resolve a dot-separated key path against `object`.
pub fn value_for_key_path(object: &dyn KeyValueCoding, path: &str) -> Value {
    let mut segments = path.split('.');
    let Some(first) = segments.next().filter(|s| !s.is_empty()) else {
        return Value::Null;
    };

    let mut current = object.value_for_key(first);
    for segment in segments {
        if current.is_null() {
            break;
        }
        current = value_for_key_on_value(&current, segment);
    }
    current
}

/// Resolve a key path against a value (used when the cursor is itself a
/// value, e.g. a repetition item).
pub fn value_for_key_path_on_value(value: &Value, path: &str) -> Value {
    match value {
        Value::Object(object) => value_for_key_path(object.as_ref(), path),
        other => path
            .split('.')
            .try_fold(other.clone(), |current, segment| {
                (!current.is_null()).then(|| value_for_key_on_value(&current, segment))
            })
            .unwrap_or_default(),
    }
}

/// Write `value` at the end of a dot-separated key path.
pub fn take_value_for_key_path(
    object: &dyn KeyValueCoding,
    value: Value,
    path: &str,
) -> Result<(), KvcError> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    if head.is_empty() {
        return Err(KvcError::EmptyKey {
            path: path.to_owned(),
        });
    }

    let Some(rest) = rest else {
        return object.take_value_for_key(value, head);
    };

    match object.value_for_key(head) {
        Value::Object(target) => take_value_for_key_path(target.as_ref(), value, rest),
        Value::Map(mut map) => {
            take_value_in_map(&mut map, value, rest, path)?;
            object.take_value_for_key(Value::Map(map), head)
        }
        _ => Err(KvcError::NotTraversable {
            key: head.to_owned(),
            path: path.to_owned(),
        }),
    }
}

fn take_value_in_map(
    map: &mut std::collections::BTreeMap<String, Value>,
    value: Value,
    path: &str,
    full_path: &str,
) -> Result<(), KvcError> {
    match path.split_once('.') {
        None if path.is_empty() => Err(KvcError::EmptyKey {
            path: full_path.to_owned(),
        }),
        None => {
            if value.is_null() {
                map.remove(path);
            } else {
                map.insert(path.to_owned(), value);
            }
            Ok(())
        }
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Map(inner)) => take_value_in_map(inner, value, rest, full_path),
            Some(Value::Object(target)) => take_value_for_key_path(target.as_ref(), value, rest),
            _ => Err(KvcError::NotTraversable {
                key: head.to_owned(),
                path: full_path.to_owned(),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Attributes: the dynamic property bag
// ---------------------------------------------------------------------------

/// Per-instance dynamic properties ("extra attributes").
///
/// Storing [`Value::Null`] removes the key, mirroring the semantics of a
/// dictionary that cannot hold nulls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: AHashMap<String, Value>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_object_for_key(&mut self, value: Value, key: &str) {
        if value.is_null() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_owned(), value);
        }
    }

    pub fn object_for_key(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Owned lookup, `Null` when absent.
    pub fn value(&self, key: &str) -> Value {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn remove_object_for_key(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set_object_for_key(v, &k);
        }
        attrs
    }
}

// ---------------------------------------------------------------------------
// Record: a shared, free-form object
// ---------------------------------------------------------------------------

/// A shared object whose every key is dynamic.
///
/// Useful as a model object in tests and for ad-hoc data handed to
/// templates through [`Value::Object`].
#[derive(Debug, Default)]
pub struct Record {
    name: String,
    attributes: Mutex<Attributes>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Mutex::new(Attributes::new()),
        }
    }

    /// Builder-style initial value.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.lock().set_object_for_key(value.into(), key);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Attributes> {
        self.attributes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueCoding for Record {
    fn value_for_key(&self, key: &str) -> Value {
        self.lock().value(key)
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> Result<(), KvcError> {
        self.lock().set_object_for_key(value, key);
        Ok(())
    }

    fn description(&self) -> String {
        format!("<Record {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;

    struct Strict {
        title: Mutex<String>,
    }

    impl KeyValueCoding for Strict {
        fn value_for_key(&self, key: &str) -> Value {
            match key {
                "title" => Value::from(self.title.lock().map(|t| t.clone()).unwrap_or_default()),
                other => self.handle_query_with_unbound_key(other),
            }
        }

        fn take_value_for_key(&self, value: Value, key: &str) -> Result<(), KvcError> {
            match key {
                "title" => {
                    if let Ok(mut t) = self.title.lock() {
                        *t = value.string_value().unwrap_or_default();
                    }
                    Ok(())
                }
                other => self.handle_take_value_for_unbound_key(value, other),
            }
        }

        fn description(&self) -> String {
            "<Strict>".into()
        }
    }

    #[test]
    fn attributes_null_removes() {
        let mut attrs = Attributes::new();
        attrs.set_object_for_key(Value::from("x"), "a");
        assert!(attrs.contains_key("a"));
        attrs.set_object_for_key(Value::Null, "a");
        assert!(attrs.is_empty());
    }

    #[test]
    fn strict_object_rejects_unbound_write() {
        let obj = Strict {
            title: Mutex::new(String::new()),
        };
        assert!(obj.take_value_for_key(Value::from("t"), "title").is_ok());
        assert_eq!(obj.value_for_key("title"), Value::from("t"));
        let err = obj.take_value_for_key(Value::Int(1), "nope").unwrap_err();
        assert_eq!(
            err,
            KvcError::UnboundKey {
                key: "nope".into(),
                target: "<Strict>".into()
            }
        );
        assert_eq!(obj.value_for_key("nope"), Value::Null);
    }

    #[test]
    fn key_path_through_objects_and_maps() {
        let address = Arc::new(Record::new("address").with("city", "Magdeburg"));
        let mut prefs = BTreeMap::new();
        prefs.insert("theme".to_string(), Value::from("dark"));
        let customer = Record::new("customer")
            .with("address", Value::object(address))
            .with("prefs", Value::Map(prefs))
            .with("tags", vec!["a", "b", "c"]);

        assert_eq!(
            value_for_key_path(&customer, "address.city"),
            Value::from("Magdeburg")
        );
        assert_eq!(value_for_key_path(&customer, "prefs.theme"), Value::from("dark"));
        assert_eq!(value_for_key_path(&customer, "tags.count"), Value::Int(3));
        assert_eq!(value_for_key_path(&customer, "missing.deeper"), Value::Null);
        assert_eq!(value_for_key_path(&customer, ""), Value::Null);
    }

    #[test]
    fn key_path_write_back_through_map() {
        let mut prefs = BTreeMap::new();
        prefs.insert("theme".to_string(), Value::from("dark"));
        let customer = Record::new("customer").with("prefs", Value::Map(prefs));

        take_value_for_key_path(&customer, Value::from("light"), "prefs.theme")
            .expect("map write-back");
        assert_eq!(value_for_key_path(&customer, "prefs.theme"), Value::from("light"));
    }

    #[test]
    fn key_path_write_through_object() {
        let address = Arc::new(Record::new("address"));
        let customer = Record::new("customer").with("address", Value::object(address.clone()));
        take_value_for_key_path(&customer, Value::from("Berlin"), "address.city")
            .expect("object write");
        assert_eq!(address.value_for_key("city"), Value::from("Berlin"));
    }

    #[test]
    fn key_path_write_errors() {
        let customer = Record::new("customer").with("name", "Ann");
        assert!(matches!(
            take_value_for_key_path(&customer, Value::Int(1), "name.first"),
            Err(KvcError::NotTraversable { .. })
        ));
        assert!(matches!(
            take_value_for_key_path(&customer, Value::Int(1), ".x"),
            Err(KvcError::EmptyKey { .. })
        ));
    }

    #[test]
    fn key_path_on_plain_values() {
        let mut m = BTreeMap::new();
        m.insert("name".to_string(), Value::from("item"));
        let v = Value::Map(m);
        assert_eq!(value_for_key_path_on_value(&v, "name"), Value::from("item"));
        assert_eq!(value_for_key_path_on_value(&v, "name.length"), Value::Int(4));
        assert_eq!(value_for_key_path_on_value(&v, "nope.length"), Value::Null);
    }
}
