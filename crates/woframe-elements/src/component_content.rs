#![forbid(unsafe_code)]

//! Render the content a component's caller wrapped around its reference.
//!
//! The content belongs to the caller's template, so it runs with the
//! caller active: the element leaves the current component, runs the
//! phase on the content and enters the component again with the same
//! content. Components without content render nothing.

use woframe_core::{Request, Response};
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentContent;

impl ComponentContent {
    pub fn new() -> Self {
        Self
    }

    fn in_caller<T: Default>(
        &self,
        ctx: &mut Context,
        phase: impl FnOnce(&ElementRef, &mut Context) -> Result<T>,
    ) -> Result<T> {
        let (Some(component), Some(content)) = (ctx.component(), ctx.component_content()) else {
            return Ok(T::default());
        };
        ctx.leave_component(&component)?;
        let outcome = phase(&content, ctx);
        ctx.enter_component(&component, Some(content))?;
        outcome
    }
}

impl Element for ComponentContent {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.in_caller(ctx, |content, ctx| content.take_values_from_request(request, ctx))
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        self.in_caller(ctx, |content, ctx| content.invoke_action(request, ctx))
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        self.in_caller(ctx, |content, ctx| content.append_to_response(response, ctx))
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        self.in_caller(ctx, |content, ctx| {
            walker.process_template(self, content.as_ref(), ctx).map(|_| ())
        })
    }
}
