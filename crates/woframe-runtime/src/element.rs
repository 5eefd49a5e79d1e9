#![forbid(unsafe_code)]

//! The element protocol.
//!
//! Every node in a template tree, stateless widget or component, answers
//! the same four phases. A single element instance is shared by every
//! request rendering its template and may appear several times within one
//! render (inside a repetition), so implementations keep no per-request
//! state in fields. Position comes from the context's element ID cursor,
//! values come from associations evaluated against the active component.
//!
//! # Phases
//!
//! | Phase | Purpose | Result |
//! |-------|---------|--------|
//! | `take_values_from_request` | push form values into bound state | `()` |
//! | `invoke_action` | run the action addressed by the sender ID | [`ActionResult`] |
//! | `append_to_response` | render | `()` |
//! | `walk_template` | visit the tree without running the other phases | `()` |

use std::fmt;
use std::sync::Arc;

use woframe_core::{Request, Response, Value};

use crate::component::ComponentRef;
use crate::context::Context;
use crate::error::Result;

/// A template node.
pub trait Element: Send + Sync + fmt::Debug {
    fn take_values_from_request(&self, _request: &Request, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn invoke_action(&self, _request: &Request, _ctx: &mut Context) -> Result<ActionResult> {
        Ok(ActionResult::None)
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()>;

    /// Offer the element's own template (if any) to `walker`.
    fn walk_template(&self, _walker: &mut dyn ElementWalker, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }
}

/// Shared template node.
pub type ElementRef = Arc<dyn Element>;

/// Visitor driven by [`Element::walk_template`].
pub trait ElementWalker {
    /// Called by `parent` for each element of its template. Recurse by
    /// calling `template.walk_template(self, ctx)`; return `false` to stop
    /// the parent from offering further siblings.
    fn process_template(
        &mut self,
        parent: &dyn Element,
        template: &dyn Element,
        ctx: &mut Context,
    ) -> Result<bool>;
}

/// Adapts a closure into an [`ElementWalker`] that descends into every
/// template for which the closure returns `true`.
pub struct FnWalker<F>(pub F);

impl<F> ElementWalker for FnWalker<F>
where
    F: FnMut(&dyn Element, &Context) -> bool,
{
    fn process_template(
        &mut self,
        _parent: &dyn Element,
        template: &dyn Element,
        ctx: &mut Context,
    ) -> Result<bool> {
        if (self.0)(template, ctx) {
            template.walk_template(self, ctx)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// Action results
// ---------------------------------------------------------------------------

/// Something that can render itself without a page.
pub trait ActionResults: Send + fmt::Debug {
    fn generate_response(&self) -> Response;
}

impl ActionResults for Response {
    fn generate_response(&self) -> Response {
        self.clone()
    }
}

/// The outcome of `invoke_action` / a component action.
#[derive(Debug, Default)]
pub enum ActionResult {
    /// Stay on the current page.
    #[default]
    None,
    /// Render this page next.
    Page(ComponentRef),
    /// Return this response as-is.
    Response(Response),
    /// Render an arbitrary action results object.
    Results(Box<dyn ActionResults>),
    /// HTML-escaped text.
    Text(String),
    /// `302` to the location.
    Redirect(String),
    /// A raw value returned from a binding; only strings render.
    Value(Value),
}

impl ActionResult {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn page(&self) -> Option<&ComponentRef> {
        match self {
            Self::Page(page) => Some(page),
            _ => None,
        }
    }
}

impl From<ComponentRef> for ActionResult {
    fn from(page: ComponentRef) -> Self {
        Self::Page(page)
    }
}

impl From<Response> for ActionResult {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Option<ComponentRef>> for ActionResult {
    fn from(page: Option<ComponentRef>) -> Self {
        page.map_or(Self::None, Self::Page)
    }
}
