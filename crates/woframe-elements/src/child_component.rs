#![forbid(unsafe_code)]

//! Embed a child component of the active component.
//!
//! The reference names a child slot declared by the parent's definition.
//! Each phase resolves the slot (waking the fault on first use), enters the
//! child with the reference's template as its content, runs the phase on
//! the child and leaves it again. Bindings flow through the component stack
//! on enter and leave.

use woframe_core::{Request, Response};
use woframe_runtime::{ActionResult, ComponentRef, Context, Element, ElementRef, ElementWalker, Result};

#[derive(Debug, Clone)]
pub struct ChildComponentReference {
    child_key: String,
    content: Option<ElementRef>,
}

impl ChildComponentReference {
    pub fn new(child_key: impl Into<String>, content: Option<ElementRef>) -> Self {
        Self {
            child_key: child_key.into(),
            content,
        }
    }

    pub fn child_key(&self) -> &str {
        &self.child_key
    }

    fn resolve(&self, ctx: &mut Context) -> Option<ComponentRef> {
        let parent = ctx.component()?;
        let child = parent.child_component_with_name(&self.child_key, ctx);
        if child.is_none() {
            tracing::warn!(
                target: "woframe::elements",
                parent = %parent.name(),
                child = %self.child_key,
                "missing child component"
            );
        }
        child
    }

    /// Run `phase` on the child between enter and leave. The leave happens
    /// even when the phase fails.
    fn with_child<T>(
        &self,
        ctx: &mut Context,
        phase: impl FnOnce(&ComponentRef, &mut Context) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(child) = self.resolve(ctx) else {
            return Ok(None);
        };
        ctx.enter_component(&child, self.content.clone())?;
        let outcome = phase(&child, ctx);
        ctx.leave_component(&child)?;
        outcome.map(Some)
    }
}

impl Element for ChildComponentReference {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.with_child(ctx, |child, ctx| child.take_values_from_request(request, ctx))?;
        Ok(())
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if !ctx.is_sender_in_subtree() {
            return Ok(ActionResult::None);
        }
        Ok(self
            .with_child(ctx, |child, ctx| child.invoke_action(request, ctx))?
            .unwrap_or_default())
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        let rendered = self.with_child(ctx, |child, ctx| child.append_to_response(response, ctx))?;
        if rendered.is_none() {
            response.append_content_string("<pre>[missing component: ");
            response.append_content_html_string(&self.child_key);
            response.append_content_string("]</pre>");
        }
        Ok(())
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        self.with_child(ctx, |child, ctx| child.walk_template(walker, ctx))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;
    use woframe_core::{constant, KeyValueCoding, Request, Value};
    use woframe_runtime::component::Bindings;
    use woframe_runtime::ComponentDefinition;

    use super::*;
    use crate::compound::Compound;
    use crate::string::DynamicString;
    use crate::testing::{application, bindings, kp, markup, page_context, probe, render};

    fn show(path: &str) -> ElementRef {
        Arc::new(DynamicString::new(bindings(&[("value", kp(path))])).expect("string"))
    }

    #[test]
    fn child_renders_with_pulled_bindings() {
        let page = Arc::new(Compound::new(vec![
            markup("<div>"),
            Arc::new(ChildComponentReference::new("badge", None)),
            markup("</div>"),
        ]));
        let app = application(vec![
            ComponentDefinition::new("Page", page).with_child(
                "badge",
                "Badge",
                bindings(&[("label", kp("user")), ("tone", constant("info"))]),
            ),
            ComponentDefinition::new("Badge", Arc::new(Compound::new(vec![show("tone"), markup(":"), show("label"), probe()]))),
        ]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wa/Page"));
        page.take_value_for_key(Value::from("ann"), "user").expect("user");

        assert_eq!(render(&mut ctx), "<div>info:ann[1.3]</div>");
        assert!(page.unresolved_child("badge").is_none());
        assert_eq!(ctx.component_stack_count(), 0);
    }

    #[traced_test]
    #[test]
    fn missing_children_render_a_marker() {
        let page = Arc::new(ChildComponentReference::new("gone", None));
        let app = application(vec![
            ComponentDefinition::new("Page", page).with_child("gone", "Nowhere", Bindings::new()),
        ]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), "<pre>[missing component: gone]</pre>");
        assert!(logs_contain("missing child component"));
    }
}
