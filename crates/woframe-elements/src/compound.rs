#![forbid(unsafe_code)]

//! A list of sibling elements.
//!
//! The compound opens one element ID segment starting at `0` and bumps it
//! after each child, so the `n`th child always answers to `…n` no matter
//! what the children themselves push.

use woframe_core::{Request, Response};
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, Result};

#[derive(Debug, Clone)]
pub struct Compound {
    children: Vec<ElementRef>,
}

impl Compound {
    pub fn new(children: Vec<ElementRef>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[ElementRef] {
        &self.children
    }

    /// Run `phase` for each child inside the compound's segment. Stops at
    /// the first child that yields `Some`; the segment is popped either way.
    fn each_child<T>(
        &self,
        ctx: &mut Context,
        mut phase: impl FnMut(&ElementRef, &mut Context) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        ctx.element_id_mut().append_zero();
        let mut outcome = Ok(None);
        for child in &self.children {
            match phase(child, ctx) {
                Ok(None) => ctx.element_id_mut().increment_last(),
                other => {
                    outcome = other;
                    break;
                }
            }
        }
        ctx.element_id_mut().delete_last();
        outcome
    }
}

impl Element for Compound {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.each_child(ctx, |child, ctx| {
            child.take_values_from_request(request, ctx)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if !ctx.is_sender_in_subtree() {
            return Ok(ActionResult::None);
        }
        let result = self.each_child(ctx, |child, ctx| {
            let result = child.invoke_action(request, ctx)?;
            Ok((!result.is_none()).then_some(result))
        })?;
        Ok(result.unwrap_or_default())
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        self.each_child(ctx, |child, ctx| {
            child.append_to_response(response, ctx)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        self.each_child(ctx, |child, ctx| {
            let descend = walker.process_template(self, child.as_ref(), ctx)?;
            Ok((!descend).then_some(()))
        })?;
        Ok(())
    }
}
