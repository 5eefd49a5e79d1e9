#![forbid(unsafe_code)]

//! `<input type="submit">` that runs an action.
//!
//! A submit carrying the button's name registers the button as the active
//! form element during take-values, which makes it the sender; the
//! invoke-action phase then runs `action` (or opens `pageName`) when the
//! cursor reaches it.

use woframe_core::{Request, Response};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Element, Result};

use crate::dynamic::ActionTarget;
use crate::input::InputCore;

#[derive(Debug)]
pub struct SubmitButton {
    target: ActionTarget,
    core: InputCore,
}

impl SubmitButton {
    pub fn new(mut bindings: Bindings) -> Self {
        let target = ActionTarget::from_bindings(&mut bindings);
        Self {
            target,
            core: InputCore::from_bindings(bindings),
        }
    }
}

impl Element for SubmitButton {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        if self.core.submitted_value(request, ctx).is_some() {
            ctx.add_active_form_element();
        }
        Ok(())
    }

    fn invoke_action(&self, _request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if !ctx.is_sender() || self.core.is_disabled(ctx) {
            return Ok(ActionResult::None);
        }
        self.target.perform(ctx)
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if ctx.is_rendering_disabled() {
            return Ok(());
        }
        response.append_begin_tag("input");
        response.append_attribute("type", "submit");
        self.core.append_core_attributes(response, ctx);
        if let Some(label) = self.core.current_value(ctx).string_value() {
            response.append_attribute("value", &label);
        }
        self.core.append_extra_attributes(response, ctx);
        response.append_begin_tag_close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use woframe_core::{constant, key_path, KeyValueCoding, Request, Value};
    use woframe_runtime::ComponentDefinition;

    use super::*;
    use crate::testing::{application, bindings, markup, page_context};

    #[test]
    fn submit_registers_and_runs_the_action() {
        let button = SubmitButton::new(bindings(&[
            ("name", constant("go")),
            ("value", constant("Go")),
            ("action", key_path("save")),
        ]));
        let app = application(vec![
            ComponentDefinition::new("Page", markup("")).with_action("save", |page, _ctx| {
                page.take_value_for_key(Value::Bool(true), "saved")?;
                Ok(ActionResult::None)
            }),
        ]);
        let request = Request::post("/wo/s/c/0").with_form_value("go", "Go");
        let (mut ctx, page) = page_context(&app, "Page", request.clone());

        button.take_values_from_request(&request, &mut ctx).expect("take");
        assert_eq!(ctx.active_form_element(), Some(""));
        assert!(ctx.is_sender());

        button.invoke_action(&request, &mut ctx).expect("invoke");
        assert_eq!(page.value_for_key("saved"), Value::Bool(true));
    }

    #[test]
    fn page_name_opens_a_page_only_for_the_sender() {
        let button = SubmitButton::new(bindings(&[("pageName", constant("Next"))]));
        let app = application(vec![
            ComponentDefinition::new("Page", markup("")),
            ComponentDefinition::new("Next", markup("next")),
        ]);
        let request = Request::post("/wa/Page");
        let (mut ctx, _page) = page_context(&app, "Page", request.clone());

        ctx.set_sender_id(Some("7".to_owned()));
        assert!(button.invoke_action(&request, &mut ctx).expect("invoke").is_none());

        ctx.set_sender_id(Some(String::new()));
        let result = button.invoke_action(&request, &mut ctx).expect("invoke");
        assert_eq!(result.page().map(|p| p.name()), Some("Next".to_owned()));
    }

    #[test]
    fn renders_label() {
        let button = SubmitButton::new(bindings(&[("name", constant("go")), ("value", constant("Save"))]));
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(button))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(
            crate::testing::render(&mut ctx),
            r#"<input type="submit" name="go" value="Save" />"#
        );
    }
}
