#![forbid(unsafe_code)]

//! Unresolved child component placeholders.
//!
//! A parent's template declares children by name; they are not built until
//! first traversed. Until then the parent's child map holds a
//! [`ComponentFault`]. A fault is deliberately not an [`Element`]: the
//! phase methods below exist only so callers that ended up holding a fault
//! get a typed error (and a visible marker when rendering) instead of a
//! silent no-op.
//!
//! [`Element`]: crate::element::Element

use std::sync::Arc;

use woframe_core::Response;

use super::{Bindings, ComponentRef};
use crate::context::Context;
use crate::element::ActionResult;
use crate::error::{ComponentError, Result};
use crate::resource_manager::{instantiate_component, ResourceManager};

/// Marker written in place of an unresolvable child.
pub const UNRESOLVED_FAULT_MARKER: &str = "[ERROR: unresolved component fault]";

#[derive(Debug, Clone)]
pub struct ComponentFault {
    key: String,
    component_name: String,
    bindings: Bindings,
    resource_manager: Option<Arc<dyn ResourceManager>>,
}

impl ComponentFault {
    pub fn new(
        key: impl Into<String>,
        component_name: impl Into<String>,
        bindings: Bindings,
        resource_manager: Option<Arc<dyn ResourceManager>>,
    ) -> Self {
        Self {
            key: key.into(),
            component_name: component_name.into(),
            bindings,
            resource_manager,
        }
    }

    /// Name of the child slot in the parent.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the component to instantiate.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Instantiate the real child through the fault's own resource manager,
    /// falling back to `fallback`.
    ///
    /// The returned component carries the fault's bindings but is not yet
    /// parented or awake; the parent does both when it swaps the fault out.
    pub fn resolve(
        &self,
        fallback: Option<Arc<dyn ResourceManager>>,
        ctx: &Context,
    ) -> Result<ComponentRef, ComponentError> {
        let Some(rm) = self.resource_manager.clone().or(fallback) else {
            return Err(ComponentError::NoResourceManager {
                name: self.component_name.clone(),
            });
        };
        let child = instantiate_component(&rm, &self.component_name, &ctx.languages())
            .ok_or_else(|| ComponentError::UnknownComponent {
                name: self.component_name.clone(),
            })?;
        child.set_bindings(Some(self.bindings.clone()));
        Ok(child)
    }

    fn unresolved(&self, operation: &str) -> ComponentError {
        self.log_unresolved(operation);
        ComponentError::UnresolvedFault {
            name: self.component_name.clone(),
        }
    }

    fn log_unresolved(&self, operation: &str) {
        tracing::error!(
            target: "woframe::component",
            child = %self.key,
            component = %self.component_name,
            operation,
            "lifecycle call on unresolved component fault"
        );
    }

    // --- phase methods: always fail ---

    pub fn take_values_from_request(&self) -> Result<()> {
        Err(self.unresolved("take_values_from_request").into())
    }

    pub fn invoke_action(&self) -> Result<ActionResult> {
        Err(self.unresolved("invoke_action").into())
    }

    pub fn walk_template(&self) -> Result<()> {
        Err(self.unresolved("walk_template").into())
    }

    pub fn perform_action_named(&self, action: &str) -> Result<ActionResult> {
        let err = self.unresolved(action);
        Err(err.into())
    }

    /// Logs and writes [`UNRESOLVED_FAULT_MARKER`] so the defect is visible
    /// in the page.
    pub fn append_to_response(&self, response: &mut Response) {
        self.log_unresolved("append_to_response");
        response.append_content_string(UNRESOLVED_FAULT_MARKER);
    }
}
