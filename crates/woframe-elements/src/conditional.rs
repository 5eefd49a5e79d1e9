#![forbid(unsafe_code)]

//! Show a template only when a condition holds.
//!
//! # Bindings
//!
//! | Binding | Meaning |
//! |---------|---------|
//! | `condition` | required; truthiness decides, unless `value` is bound |
//! | `value` | show when `condition` loosely equals this value |
//! | `negate` | flip the outcome |
//!
//! A shown branch renders under an extra `1` segment so siblings keep their
//! IDs whether or not the branch is visible.

use woframe_core::{AssociationRef, Request, Response};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, Result};

use crate::dynamic::{bool_in_context, grab_association, value_in_context};
use crate::error::ElementError;

#[derive(Debug)]
pub struct Conditional {
    condition: AssociationRef,
    value: Option<AssociationRef>,
    negate: Option<AssociationRef>,
    template: ElementRef,
}

impl Conditional {
    pub fn new(mut bindings: Bindings, template: ElementRef) -> Result<Self, ElementError> {
        let condition = grab_association(&mut bindings, "condition").ok_or(ElementError::MissingBinding {
            element: "Conditional",
            binding: "condition",
        })?;
        let value = grab_association(&mut bindings, "value");
        let negate = grab_association(&mut bindings, "negate");
        if !bindings.is_empty() {
            tracing::warn!(
                target: "woframe::elements",
                unused = ?bindings.keys().collect::<Vec<_>>(),
                "conditional ignores extra bindings"
            );
        }
        Ok(Self {
            condition,
            value,
            negate,
            template,
        })
    }

    fn is_shown(&self, ctx: &Context) -> bool {
        let condition = value_in_context(self.condition.as_ref(), ctx);
        let holds = match &self.value {
            Some(value) => condition.loosely_equals(&value_in_context(value.as_ref(), ctx)),
            None => condition.bool_value(),
        };
        holds != bool_in_context(self.negate.as_ref(), ctx)
    }

    fn in_branch<T: Default>(
        &self,
        ctx: &mut Context,
        phase: impl FnOnce(&dyn Element, &mut Context) -> Result<T>,
    ) -> Result<T> {
        if !self.is_shown(ctx) {
            return Ok(T::default());
        }
        ctx.element_id_mut().append("1");
        let outcome = phase(self.template.as_ref(), ctx);
        ctx.element_id_mut().delete_last();
        outcome
    }
}

impl Element for Conditional {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.in_branch(ctx, |template, ctx| template.take_values_from_request(request, ctx))
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        self.in_branch(ctx, |template, ctx| template.invoke_action(request, ctx))
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        self.in_branch(ctx, |template, ctx| template.append_to_response(response, ctx))
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        self.in_branch(ctx, |template, ctx| {
            walker.process_template(self, template, ctx).map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use woframe_core::{constant, KeyValueCoding, Request, Value};
    use woframe_runtime::ComponentDefinition;

    use super::*;
    use crate::compound::Compound;
    use crate::testing::{application, bindings, kp, page_context, probe, render};

    fn page(conditional: Conditional) -> ElementRef {
        Arc::new(Compound::new(vec![probe(), Arc::new(conditional), probe()]))
    }

    #[test]
    fn hidden_branch_keeps_sibling_ids() {
        let cond = Conditional::new(bindings(&[("condition", kp("flag"))]), probe()).expect("cond");
        let app = application(vec![ComponentDefinition::new("Page", page(cond))]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), "[0][2]");
        page.take_value_for_key(Value::Bool(true), "flag").expect("flag");
        assert_eq!(render(&mut ctx), "[0][1.1][2]");
    }

    #[test]
    fn value_comparison_and_negation() {
        let cond = Conditional::new(
            bindings(&[
                ("condition", kp("mode")),
                ("value", constant("edit")),
                ("negate", constant(true)),
            ]),
            probe(),
        )
        .expect("cond");
        let app = application(vec![ComponentDefinition::new("Page", page(cond))]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wa/Page"));

        page.take_value_for_key(Value::from("edit"), "mode").expect("mode");
        assert_eq!(render(&mut ctx), "[0][2]");
        page.take_value_for_key(Value::from("view"), "mode").expect("mode");
        assert_eq!(render(&mut ctx), "[0][1.1][2]");
    }

    #[test]
    fn condition_binding_is_required() {
        let err = Conditional::new(bindings(&[("negate", constant(true))]), probe()).unwrap_err();
        assert_eq!(
            err,
            ElementError::MissingBinding {
                element: "Conditional",
                binding: "condition"
            }
        );
    }
}
