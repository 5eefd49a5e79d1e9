#![forbid(unsafe_code)]

//! Component definition lookup.
//!
//! The application, and optionally individual components, carry a
//! [`ResourceManager`] that turns a component name into a definition. The
//! stock implementation is an in-memory [`ComponentRegistry`] with optional
//! per-language variants and a name → URL table for static resources.

use std::fmt;
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use woframe_core::ResourceLocator;

use crate::component::{ComponentDefinition, ComponentRef};

/// Looks up component definitions and resource URLs.
pub trait ResourceManager: Send + Sync + fmt::Debug {
    /// Definition for `name`, preferring the first matching language.
    fn definition_for_component_named(
        &self,
        name: &str,
        languages: &[String],
    ) -> Option<Arc<ComponentDefinition>>;

    fn url_for_resource_named(&self, _name: &str, _languages: &[String]) -> Option<String> {
        None
    }
}

/// Instantiate `name` through `resource_manager`; the new instance keeps a
/// handle to the manager for resolving its own children.
pub fn instantiate_component(
    resource_manager: &Arc<dyn ResourceManager>,
    name: &str,
    languages: &[String],
) -> Option<ComponentRef> {
    let definition = resource_manager.definition_for_component_named(name, languages)?;
    Some(definition.instantiate(Some(Arc::clone(resource_manager))))
}

type DefinitionKey = (String, Option<String>);

/// In-memory resource manager.
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: RwLock<AHashMap<DefinitionKey, Arc<ComponentDefinition>>>,
    resources: RwLock<AHashMap<String, String>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.definitions.read().map(|d| d.len()).unwrap_or_default();
        f.debug_struct("ComponentRegistry")
            .field("definitions", &count)
            .finish_non_exhaustive()
    }
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the language-neutral definition; replaces an earlier one.
    pub fn register(&self, definition: ComponentDefinition) -> &Self {
        self.insert((definition.name().to_owned(), None), definition);
        self
    }

    /// Register a variant used when `language` is requested.
    pub fn register_localized(&self, language: &str, definition: ComponentDefinition) -> &Self {
        self.insert(
            (definition.name().to_owned(), Some(language.to_owned())),
            definition,
        );
        self
    }

    fn insert(&self, key: DefinitionKey, definition: ComponentDefinition) {
        tracing::debug!(
            target: "woframe::resource",
            component = %key.0,
            language = key.1.as_deref().unwrap_or("*"),
            "register component definition"
        );
        self.definitions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, Arc::new(definition));
    }

    pub fn register_resource(&self, name: &str, url: &str) -> &Self {
        self.resources
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.to_owned(), url.to_owned());
        self
    }

    pub fn component_names(&self) -> Vec<String> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<String> = definitions.keys().map(|(name, _)| name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl ResourceManager for ComponentRegistry {
    fn definition_for_component_named(
        &self,
        name: &str,
        languages: &[String],
    ) -> Option<Arc<ComponentDefinition>> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        languages
            .iter()
            .find_map(|lang| definitions.get(&(name.to_owned(), Some(lang.clone()))))
            .or_else(|| definitions.get(&(name.to_owned(), None)))
            .cloned()
    }

    fn url_for_resource_named(&self, name: &str, _languages: &[String]) -> Option<String> {
        self.resources
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl ResourceLocator for ComponentRegistry {
    fn url_for_resource_named(&self, name: &str) -> Option<String> {
        ResourceManager::url_for_resource_named(self, name, &[])
    }
}
