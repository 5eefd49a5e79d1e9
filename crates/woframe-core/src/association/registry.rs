#![forbid(unsafe_code)]

//! Prefix → association factory table.
//!
//! The registry is an ordinary value built at application start and handed
//! to whatever builds templates. There is no process-wide table.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = AssociationRegistry::new();
//! registry.register("upper", Arc::new(|_name: &str, value: &str| {
//!     constant(value.to_uppercase())
//! }));
//! let assoc = registry.parse_binding("title", "var:page.title");
//! ```

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use super::{
    constant, key_path, parse_plist_lite, AssociationRef, KeyPathPatternAssociation,
    NegateAssociation, ResourceLocator, ResourcePatternAssociation, ResourceUrlAssociation,
};

/// Builds an association from `(binding name, value text)`.
pub type AssociationFactory = Arc<dyn Fn(&str, &str) -> AssociationRef + Send + Sync>;

/// Open table of association prefixes.
#[derive(Clone)]
pub struct AssociationRegistry {
    factories: AHashMap<String, AssociationFactory>,
    locator: Option<Arc<dyn ResourceLocator>>,
}

impl fmt::Debug for AssociationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        f.debug_struct("AssociationRegistry")
            .field("prefixes", &prefixes)
            .field("locator", &self.locator)
            .finish()
    }
}

impl Default for AssociationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationRegistry {
    /// Registry with the built-in prefixes and no resource locator.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: AHashMap::new(),
            locator: None,
        };
        registry.install_builtins();
        registry
    }

    /// Registry whose `rsrc:` / `rsrcpat:` bindings resolve through `locator`.
    pub fn with_resource_locator(locator: Arc<dyn ResourceLocator>) -> Self {
        let mut registry = Self {
            factories: AHashMap::new(),
            locator: Some(locator),
        };
        registry.install_builtins();
        registry
    }

    fn install_builtins(&mut self) {
        self.register("const", Arc::new(|_name: &str, value: &str| constant(value)));
        self.register(
            "var",
            Arc::new(|name: &str, value: &str| {
                if value.is_empty() {
                    tracing::error!(
                        target: "woframe::elements",
                        binding = name,
                        "var: association without key path"
                    );
                    constant(format!("[binding '{name}' has no value]"))
                } else {
                    key_path(value)
                }
            }),
        );
        self.register(
            "not",
            Arc::new(|_name: &str, value: &str| -> AssociationRef {
                Arc::new(NegateAssociation::new(key_path(value)))
            }),
        );
        self.register(
            "varpat",
            Arc::new(|_name: &str, value: &str| -> AssociationRef {
                Arc::new(KeyPathPatternAssociation::new(value))
            }),
        );
        self.register(
            "plist",
            Arc::new(|_name: &str, value: &str| constant(parse_plist_lite(value))),
        );

        let locator = self.locator.clone();
        self.register(
            "rsrc",
            Arc::new(move |_name: &str, value: &str| -> AssociationRef {
                Arc::new(ResourceUrlAssociation::new(value, locator.clone()))
            }),
        );
        let locator = self.locator.clone();
        self.register(
            "rsrcpat",
            Arc::new(move |_name: &str, value: &str| -> AssociationRef {
                Arc::new(ResourcePatternAssociation::new(value, locator.clone()))
            }),
        );
    }

    /// Add or replace the factory for `prefix`. Empty prefixes are ignored.
    pub fn register(&mut self, prefix: &str, factory: AssociationFactory) {
        if prefix.is_empty() {
            tracing::error!(target: "woframe::elements", "refusing to register an empty association prefix");
            return;
        }
        self.factories.insert(prefix.to_owned(), factory);
    }

    pub fn unregister(&mut self, prefix: &str) -> bool {
        self.factories.remove(prefix).is_some()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.factories.contains_key(prefix)
    }

    /// Build the association for an already split `prefix` / `value`.
    ///
    /// Unknown prefixes yield a constant holding `value`.
    pub fn association_for_prefix(&self, prefix: &str, name: &str, value: &str) -> AssociationRef {
        match self.factories.get(prefix) {
            Some(factory) => factory(name, value),
            None => constant(value),
        }
    }

    /// Build the association for a raw attribute text such as `var:title`.
    ///
    /// Text without a registered prefix is a constant of the whole text, so
    /// a literal like `name:action` survives untouched.
    pub fn parse_binding(&self, name: &str, text: &str) -> AssociationRef {
        match text.split_once(':') {
            Some((prefix, value)) if self.has_prefix(prefix) => {
                self.association_for_prefix(prefix, name, value)
            }
            _ => constant(text),
        }
    }
}
