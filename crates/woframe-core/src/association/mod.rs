#![forbid(unsafe_code)]

//! Associations: bindings between element attributes and a cursor object.
//!
//! An [`Association`] is created once at template build time and shared by
//! every request that renders the template, so implementations hold no
//! per-request state. The cursor passed to each call is whatever object
//! the binding should be evaluated against, usually the active component.
//!
//! # Built-in variants
//!
//! | Prefix | Type | Constant | Settable |
//! |--------|------|----------|----------|
//! | `const:` (default) | [`ConstantAssociation`] | yes | no |
//! | `var:` single key | [`KeyAssociation`] | no | yes |
//! | `var:` dotted path | [`KeyPathAssociation`] | no | if the path prefix resolves |
//! | `not:` | [`NegateAssociation`] | no | if the wrapped one is |
//! | `varpat:` | [`KeyPathPatternAssociation`] | no | no |
//! | `rsrc:` | [`ResourceUrlAssociation`] | no | no |
//! | `rsrcpat:` | [`ResourcePatternAssociation`] | no | no |
//! | `plist:` | [`ConstantAssociation`] holding a list | yes | no |
//!
//! New prefixes are added through [`AssociationRegistry::register`].
//!
//! # Failure Modes
//!
//! Reads never fail; the typed accessors coerce leniently through
//! [`Value`]. Writes to a non-settable association return
//! [`AssociationError::NotSettable`].

mod registry;

use std::fmt;
use std::sync::Arc;

pub use registry::{AssociationFactory, AssociationRegistry};

use crate::kvc::{take_value_for_key_path, value_for_key_path, KeyValueCoding, KvcError};
use crate::pattern;
use crate::value::Value;

/// Errors raised when pushing a value through an association.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssociationError {
    #[error("association {association} is not settable")]
    NotSettable { association: String },
    #[error(transparent)]
    Kvc(#[from] KvcError),
}

/// A polymorphic value binding.
pub trait Association: Send + Sync + fmt::Debug {
    /// True if the value is the same for every cursor.
    fn is_value_constant(&self) -> bool {
        false
    }

    fn is_value_settable(&self) -> bool {
        false
    }

    fn is_value_constant_in_component(&self, _cursor: &dyn KeyValueCoding) -> bool {
        self.is_value_constant()
    }

    fn is_value_settable_in_component(&self, _cursor: &dyn KeyValueCoding) -> bool {
        self.is_value_settable()
    }

    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value;

    fn set_value(&self, _value: Value, _cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        Err(AssociationError::NotSettable {
            association: format!("{self:?}"),
        })
    }

    /// The key path this association reads, if it reads one.
    fn key_path(&self) -> Option<&str> {
        None
    }

    // --- typed accessors ---

    fn bool_value_in_component(&self, cursor: &dyn KeyValueCoding) -> bool {
        self.value_in_component(cursor).bool_value()
    }

    fn int_value_in_component(&self, cursor: &dyn KeyValueCoding) -> i64 {
        self.value_in_component(cursor).int_value()
    }

    fn string_value_in_component(&self, cursor: &dyn KeyValueCoding) -> Option<String> {
        self.value_in_component(cursor).string_value()
    }

    fn set_bool_value(&self, value: bool, cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        self.set_value(Value::Bool(value), cursor)
    }

    fn set_int_value(&self, value: i64, cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        self.set_value(Value::Int(value), cursor)
    }

    fn set_string_value(
        &self,
        value: Option<String>,
        cursor: &dyn KeyValueCoding,
    ) -> Result<(), AssociationError> {
        self.set_value(Value::from(value), cursor)
    }
}

/// Shared association handle, as stored in element binding maps.
pub type AssociationRef = Arc<dyn Association>;

/// A constant association.
pub fn constant(value: impl Into<Value>) -> AssociationRef {
    Arc::new(ConstantAssociation::new(value))
}

/// A key or key-path association, picking the single-key variant when the
/// path has no dots.
pub fn key_path(path: &str) -> AssociationRef {
    if path.contains('.') {
        Arc::new(KeyPathAssociation::new(path))
    } else {
        Arc::new(KeyAssociation::new(path))
    }
}

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConstantAssociation {
    value: Value,
}

impl ConstantAssociation {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Association for ConstantAssociation {
    fn is_value_constant(&self) -> bool {
        true
    }

    fn value_in_component(&self, _cursor: &dyn KeyValueCoding) -> Value {
        self.value.clone()
    }
}

// ---------------------------------------------------------------------------
// Key / key path
// ---------------------------------------------------------------------------

/// Reads and writes a single key on the cursor.
#[derive(Debug, Clone)]
pub struct KeyAssociation {
    key: String,
}

impl KeyAssociation {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Association for KeyAssociation {
    fn is_value_settable(&self) -> bool {
        true
    }

    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value {
        cursor.value_for_key(&self.key)
    }

    fn set_value(&self, value: Value, cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        cursor.take_value_for_key(value, &self.key)?;
        Ok(())
    }

    fn key_path(&self) -> Option<&str> {
        Some(&self.key)
    }
}

/// Reads and writes a dotted key path on the cursor.
#[derive(Debug, Clone)]
pub struct KeyPathAssociation {
    path: String,
}

impl KeyPathAssociation {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Association for KeyPathAssociation {
    fn is_value_settable(&self) -> bool {
        true
    }

    /// Settable when everything before the last segment resolves to
    /// something that can hold a key.
    fn is_value_settable_in_component(&self, cursor: &dyn KeyValueCoding) -> bool {
        match self.path.rsplit_once('.') {
            None => true,
            Some((owner, _)) => matches!(
                value_for_key_path(cursor, owner),
                Value::Object(_) | Value::Map(_)
            ),
        }
    }

    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value {
        value_for_key_path(cursor, &self.path)
    }

    fn set_value(&self, value: Value, cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        take_value_for_key_path(cursor, value, &self.path)?;
        Ok(())
    }

    fn key_path(&self) -> Option<&str> {
        Some(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Negation
// ---------------------------------------------------------------------------

/// Boolean inversion of another association.
#[derive(Debug, Clone)]
pub struct NegateAssociation {
    inner: AssociationRef,
}

impl NegateAssociation {
    pub fn new(inner: AssociationRef) -> Self {
        Self { inner }
    }
}

impl Association for NegateAssociation {
    fn is_value_constant(&self) -> bool {
        self.inner.is_value_constant()
    }

    fn is_value_settable(&self) -> bool {
        self.inner.is_value_settable()
    }

    fn is_value_settable_in_component(&self, cursor: &dyn KeyValueCoding) -> bool {
        self.inner.is_value_settable_in_component(cursor)
    }

    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value {
        Value::Bool(!self.inner.bool_value_in_component(cursor))
    }

    fn set_value(&self, value: Value, cursor: &dyn KeyValueCoding) -> Result<(), AssociationError> {
        self.inner.set_value(Value::Bool(!value.bool_value()), cursor)
    }

    fn key_path(&self) -> Option<&str> {
        self.inner.key_path()
    }
}

// ---------------------------------------------------------------------------
// Patterns and resources
// ---------------------------------------------------------------------------

/// Formats a `%(keyPath)s` pattern against the cursor.
#[derive(Debug, Clone)]
pub struct KeyPathPatternAssociation {
    pattern: String,
}

impl KeyPathPatternAssociation {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl Association for KeyPathPatternAssociation {
    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value {
        Value::Str(pattern::format(&self.pattern, cursor))
    }
}

/// Resolves resource names to public URLs.
///
/// Supplied by the application's resource layer; the association registry
/// only holds it.
pub trait ResourceLocator: Send + Sync + fmt::Debug {
    fn url_for_resource_named(&self, name: &str) -> Option<String>;
}

/// `rsrc:` binding: the URL of a named resource.
#[derive(Debug, Clone)]
pub struct ResourceUrlAssociation {
    name: String,
    locator: Option<Arc<dyn ResourceLocator>>,
}

impl ResourceUrlAssociation {
    pub fn new(name: impl Into<String>, locator: Option<Arc<dyn ResourceLocator>>) -> Self {
        Self {
            name: name.into(),
            locator,
        }
    }
}

fn resolve_resource(locator: Option<&Arc<dyn ResourceLocator>>, name: &str) -> Value {
    let url = locator.and_then(|locator| locator.url_for_resource_named(name));
    if url.is_none() {
        tracing::warn!(target: "woframe::elements", resource = name, "could not resolve resource URL");
    }
    Value::from(url)
}

impl Association for ResourceUrlAssociation {
    fn value_in_component(&self, _cursor: &dyn KeyValueCoding) -> Value {
        resolve_resource(self.locator.as_ref(), &self.name)
    }
}

/// `rsrcpat:` binding: a pattern producing a resource name, then its URL.
#[derive(Debug, Clone)]
pub struct ResourcePatternAssociation {
    pattern: String,
    locator: Option<Arc<dyn ResourceLocator>>,
}

impl ResourcePatternAssociation {
    pub fn new(pattern: impl Into<String>, locator: Option<Arc<dyn ResourceLocator>>) -> Self {
        Self {
            pattern: pattern.into(),
            locator,
        }
    }
}

impl Association for ResourcePatternAssociation {
    fn value_in_component(&self, cursor: &dyn KeyValueCoding) -> Value {
        let name = pattern::format(&self.pattern, cursor);
        resolve_resource(self.locator.as_ref(), &name)
    }
}

/// Parse the `(a, b, c)` list form accepted by `plist:` bindings.
///
/// Items may be double-quoted; anything that is not a parenthesized list is
/// returned as a plain string.
pub fn parse_plist_lite(text: &str) -> Value {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return Value::from(trimmed);
    };
    if body.trim().is_empty() {
        return Value::List(Vec::new());
    }
    Value::List(
        body.split(',')
            .map(|item| {
                let item = item.trim();
                let item = item
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(item);
                Value::from(item)
            })
            .collect(),
    )
}
