#![forbid(unsafe_code)]

//! Shared plumbing for dynamic elements.
//!
//! Elements are built from the binding map a template parser produced for
//! them. Each constructor grabs the bindings it understands; whatever is
//! left becomes [`ExtraAttributes`] rendered verbatim as HTML attributes.
//! Every evaluation goes through the context's cursor, the active
//! component, so a single element instance stays free of request state.

use woframe_core::{Association, AssociationError, AssociationRef, Record, Response, Value};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Result};

/// Remove and return binding `name`.
pub fn grab_association(bindings: &mut Bindings, name: &str) -> Option<AssociationRef> {
    bindings.remove(name)
}

/// Remove the first binding present among `names`.
pub fn grab_any(bindings: &mut Bindings, names: &[&str]) -> Option<AssociationRef> {
    names.iter().find_map(|name| bindings.remove(*name))
}

/// Evaluate `assoc` against the active component. Without a cursor only
/// constants produce a value.
pub fn value_in_context(assoc: &dyn Association, ctx: &Context) -> Value {
    match ctx.cursor() {
        Some(cursor) => assoc.value_in_component(&cursor),
        None if assoc.is_value_constant() => assoc.value_in_component(&Record::default()),
        None => Value::Null,
    }
}

pub fn bool_in_context(assoc: Option<&AssociationRef>, ctx: &Context) -> bool {
    assoc.is_some_and(|a| value_in_context(a.as_ref(), ctx).bool_value())
}

pub fn string_in_context(assoc: Option<&AssociationRef>, ctx: &Context) -> Option<String> {
    assoc.and_then(|a| value_in_context(a.as_ref(), ctx).string_value())
}

/// Whether `assoc` can be written through the active component.
pub fn settable_in_context(assoc: &dyn Association, ctx: &Context) -> bool {
    ctx.cursor()
        .is_some_and(|cursor| assoc.is_value_settable_in_component(&cursor))
}

/// Push `value` through `assoc` into the active component.
pub fn set_in_context(assoc: &dyn Association, value: Value, ctx: &Context) -> Result<(), AssociationError> {
    match ctx.cursor() {
        Some(cursor) => assoc.set_value(value, &cursor),
        None => Err(AssociationError::NotSettable {
            association: format!("{assoc:?} (no active component)"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Extra attributes
// ---------------------------------------------------------------------------

/// Leftover bindings rendered as `name="value"` pairs.
#[derive(Debug, Clone, Default)]
pub struct ExtraAttributes {
    attributes: Vec<(String, AssociationRef)>,
}

impl ExtraAttributes {
    /// Take every remaining binding.
    pub fn from_bindings(bindings: Bindings) -> Self {
        Self {
            attributes: bindings.into_iter().collect(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Null values skip the attribute.
    pub fn append_to_response(&self, response: &mut Response, ctx: &Context) {
        for (name, assoc) in &self.attributes {
            if let Some(value) = value_in_context(assoc.as_ref(), ctx).string_value() {
                response.append_attribute(name, &value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Action targets
// ---------------------------------------------------------------------------

/// What activating a button, link or form runs: a named action on the
/// active component, or a fresh page.
///
/// `action` names an entry of the component's action table. A key or key
/// path binding names it by its path, any other binding by its value.
#[derive(Debug, Clone, Default)]
pub struct ActionTarget {
    action: Option<AssociationRef>,
    page_name: Option<AssociationRef>,
}

impl ActionTarget {
    pub fn from_bindings(bindings: &mut Bindings) -> Self {
        Self {
            action: grab_association(bindings, "action"),
            page_name: grab_association(bindings, "pageName"),
        }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.action.is_some() || self.page_name.is_some()
    }

    pub fn action_name(&self, ctx: &Context) -> Option<String> {
        let action = self.action.as_ref()?;
        match action.key_path() {
            Some(path) => Some(path.to_owned()),
            None => value_in_context(action.as_ref(), ctx).string_value(),
        }
    }

    /// Run the target. Unbound targets yield [`ActionResult::None`].
    pub fn perform(&self, ctx: &mut Context) -> Result<ActionResult> {
        if self.action.is_some() {
            let (Some(name), Some(cursor)) = (self.action_name(ctx), ctx.cursor()) else {
                tracing::warn!(
                    target: "woframe::elements",
                    element_id = %ctx.element_id(),
                    "action binding did not name an action"
                );
                return Ok(ActionResult::None);
            };
            return cursor.perform_action_named(&name, ctx);
        }
        match string_in_context(self.page_name.as_ref(), ctx) {
            Some(name) => Ok(ActionResult::Page(ctx.page_with_name(&name)?)),
            None => Ok(ActionResult::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use woframe_core::{constant, key_path, Request};

    use super::*;
    use crate::testing::{application, bindings};

    #[test]
    fn grabbing_consumes_bindings() {
        let mut bindings = Bindings::new();
        bindings.insert("value".into(), key_path("title"));
        bindings.insert("v".into(), constant("x"));
        bindings.insert("class".into(), constant("wide"));

        assert!(grab_association(&mut bindings, "value").is_some());
        assert!(grab_association(&mut bindings, "value").is_none());
        assert!(grab_any(&mut bindings, &["value", "v"]).is_some());

        let extras = ExtraAttributes::from_bindings(bindings);
        assert_eq!(extras.names().collect::<Vec<_>>(), vec!["class"]);
    }

    #[test]
    fn only_constants_evaluate_without_cursor() {
        let app = application(Vec::new());
        let ctx = Context::new(Arc::clone(&app), Arc::new(Request::get("/wa")));

        assert!(ctx.cursor().is_none());
        assert_eq!(value_in_context(constant(3).as_ref(), &ctx), Value::Int(3));
        assert_eq!(value_in_context(key_path("title").as_ref(), &ctx), Value::Null);
        assert!(set_in_context(key_path("title").as_ref(), Value::Int(1), &ctx).is_err());
    }

    #[test]
    fn action_names_come_from_paths_or_values() {
        let app = application(Vec::new());
        let ctx = Context::new(Arc::clone(&app), Arc::new(Request::get("/wa")));

        let mut by_path = bindings(&[("action", key_path("cart.checkout"))]);
        let target = ActionTarget::from_bindings(&mut by_path);
        assert!(by_path.is_empty());
        assert_eq!(target.action_name(&ctx).as_deref(), Some("cart.checkout"));

        let mut by_value = bindings(&[("action", constant("save"))]);
        assert_eq!(
            ActionTarget::from_bindings(&mut by_value).action_name(&ctx).as_deref(),
            Some("save")
        );

        let unbound = ActionTarget::default();
        assert!(!unbound.is_bound());
        assert!(unbound.action_name(&ctx).is_none());
    }
}
