#![forbid(unsafe_code)]

//! Fixtures shared by the element tests.

use std::sync::Arc;

use woframe_core::{key_path, AssociationRef, Request, Response};
use woframe_runtime::component::Bindings;
use woframe_runtime::{
    Application, ComponentDefinition, ComponentRef, ComponentRegistry, Context, Element, ElementRef,
    Result,
};

/// Static markup.
#[derive(Debug)]
pub(crate) struct Markup(pub &'static str);

impl Element for Markup {
    fn append_to_response(&self, response: &mut Response, _ctx: &mut Context) -> Result<()> {
        response.append_content_string(self.0);
        Ok(())
    }
}

/// Writes the element ID it was rendered at, in brackets.
#[derive(Debug)]
pub(crate) struct Probe;

impl Element for Probe {
    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        response.append_content_string("[");
        response.append_content_string(ctx.element_id().as_str());
        response.append_content_string("]");
        Ok(())
    }
}

pub(crate) fn markup(text: &'static str) -> ElementRef {
    Arc::new(Markup(text))
}

pub(crate) fn probe() -> ElementRef {
    Arc::new(Probe)
}

pub(crate) fn bindings(pairs: &[(&str, AssociationRef)]) -> Bindings {
    pairs
        .iter()
        .map(|(name, assoc)| ((*name).to_owned(), Arc::clone(assoc)))
        .collect()
}

pub(crate) fn kp(path: &str) -> AssociationRef {
    key_path(path)
}

pub(crate) fn application(definitions: Vec<ComponentDefinition>) -> Arc<Application> {
    let registry = Arc::new(ComponentRegistry::new());
    for definition in definitions {
        registry.register(definition);
    }
    Application::builder().resource_manager(registry).build()
}

/// A context with `name` instantiated as its page.
pub(crate) fn page_context(app: &Arc<Application>, name: &str, request: Request) -> (Context, ComponentRef) {
    let mut ctx = Context::new(Arc::clone(app), Arc::new(request));
    let page = ctx.page_with_name(name).expect("page");
    ctx.set_page(Some(page.clone()));
    (ctx, page)
}

/// Render the context's page and return the markup.
pub(crate) fn render(ctx: &mut Context) -> String {
    let app = Arc::clone(ctx.application());
    let mut response = Response::new();
    app.append_to_response(&mut response, ctx).expect("render");
    assert!(ctx.element_id().is_empty(), "element ID left unbalanced: {}", ctx.element_id());
    response.content_string().into_owned()
}

/// Run take-values then invoke-action against the context's page.
pub(crate) fn submit(ctx: &mut Context) -> woframe_runtime::ActionResult {
    let app = Arc::clone(ctx.application());
    let request = ctx.request_arc();
    app.take_values_from_request(&request, ctx).expect("take values");
    assert!(ctx.element_id().is_empty(), "take values left {}", ctx.element_id());
    let result = app.invoke_action(&request, ctx).expect("invoke");
    assert!(ctx.element_id().is_empty(), "invoke left {}", ctx.element_id());
    result
}

/// Undo the attribute escaping of `/`.
pub(crate) fn unescape(html: &str) -> String {
    html.replace("&#x2f;", "/").replace("&#x27;", "'").replace("&amp;", "&")
}
