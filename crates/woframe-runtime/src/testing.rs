#![forbid(unsafe_code)]

//! Fixtures shared by the runtime's unit tests.

use std::sync::Arc;

use woframe_core::{Request, Response};

use crate::application::Application;
use crate::component::ComponentDefinition;
use crate::context::Context;
use crate::element::{Element, ElementRef};
use crate::error::Result;
use crate::resource_manager::ComponentRegistry;

/// Static markup.
#[derive(Debug)]
pub(crate) struct Markup(pub &'static str);

impl Element for Markup {
    fn append_to_response(&self, response: &mut Response, _ctx: &mut Context) -> Result<()> {
        response.append_content_string(self.0);
        Ok(())
    }
}

/// Renders the active component's `key` value.
#[derive(Debug)]
pub(crate) struct Show(pub &'static str);

impl Element for Show {
    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        use woframe_core::KeyValueCoding;
        if let Some(component) = ctx.component() {
            response.append_content_string(&component.value_for_key(self.0).to_string());
        }
        Ok(())
    }
}

pub(crate) fn markup(text: &'static str) -> ElementRef {
    Arc::new(Markup(text))
}

pub(crate) fn application(definitions: Vec<ComponentDefinition>) -> Arc<Application> {
    let registry = Arc::new(ComponentRegistry::new());
    for definition in definitions {
        registry.register(definition);
    }
    Application::builder().resource_manager(registry).build()
}

pub(crate) fn context(application: &Arc<Application>, request: Request) -> Context {
    Context::new(Arc::clone(application), Arc::new(request))
}
