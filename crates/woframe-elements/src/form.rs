#![forbid(unsafe_code)]

//! `<form>` wrapping inputs.
//!
//! # Bindings
//!
//! | Binding | Meaning |
//! |---------|---------|
//! | `action` / `pageName` | run when the form itself is the sender |
//! | `directActionName` | post to a direct action instead of the page |
//! | `href` | post to a literal URL |
//! | `method` | defaults to `post` |
//! | `forceTakeValues` | take values even when another element is the sender |
//! | `errorReport` | collect input errors of this form in a fresh report |
//! | `errors` | receives the collected error messages |
//!
//! # Invariants
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Nesting | a form inside a form renders only its content, logged |
//! | Take values | only when forced, the sender lies in the form, or the request is a POST |
//! | Reports | a pushed error report is popped before the phase returns |

use std::collections::BTreeMap;

use woframe_core::{AssociationRef, Request, Response, Value};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, ErrorReport, Result};

use crate::dynamic::{
    bool_in_context, grab_association, set_in_context, settable_in_context, string_in_context,
    ActionTarget, ExtraAttributes,
};

#[derive(Debug)]
pub struct Form {
    target: ActionTarget,
    direct_action_name: Option<AssociationRef>,
    href: Option<AssociationRef>,
    method: Option<AssociationRef>,
    force_take_values: Option<AssociationRef>,
    error_report: Option<AssociationRef>,
    errors: Option<AssociationRef>,
    extra: ExtraAttributes,
    template: ElementRef,
}

impl Form {
    pub fn new(mut bindings: Bindings, template: ElementRef) -> Self {
        Self {
            target: ActionTarget::from_bindings(&mut bindings),
            direct_action_name: grab_association(&mut bindings, "directActionName"),
            href: grab_association(&mut bindings, "href"),
            method: grab_association(&mut bindings, "method"),
            force_take_values: grab_association(&mut bindings, "forceTakeValues"),
            error_report: grab_association(&mut bindings, "errorReport"),
            errors: grab_association(&mut bindings, "errors"),
            extra: ExtraAttributes::from_bindings(bindings),
            template,
        }
    }

    /// Run `phase` over the content with the in-form flag set. A nested
    /// form only forwards to its content.
    fn in_form<T>(
        &self,
        ctx: &mut Context,
        phase: impl FnOnce(&dyn Element, &mut Context) -> Result<T>,
    ) -> Result<T> {
        if ctx.is_in_form() {
            tracing::error!(
                target: "woframe::forms",
                element_id = %ctx.element_id(),
                "nested form, rendering content only"
            );
            return phase(self.template.as_ref(), ctx);
        }
        ctx.set_in_form(true);
        let outcome = phase(self.template.as_ref(), ctx);
        ctx.set_in_form(false);
        outcome
    }

    fn should_take_values(&self, request: &Request, ctx: &Context) -> bool {
        bool_in_context(self.force_take_values.as_ref(), ctx)
            || (ctx.sender_id().is_some() && ctx.is_sender_in_subtree())
            || request.is_post()
    }

    fn publish_errors(&self, report: ErrorReport, ctx: &Context) {
        let Some(errors) = &self.errors else {
            return;
        };
        if !settable_in_context(errors.as_ref(), ctx) {
            tracing::warn!(target: "woframe::forms", "form errors binding is not settable");
            return;
        }
        let messages: Vec<Value> = report
            .errors()
            .iter()
            .map(|item| Value::from(item.message.clone()))
            .collect();
        if let Err(err) = set_in_context(errors.as_ref(), Value::List(messages), ctx) {
            tracing::warn!(target: "woframe::forms", error = %err, "could not publish form errors");
        }
    }

    fn action_url(&self, ctx: &mut Context) -> Result<String> {
        if let Some(name) = string_in_context(self.direct_action_name.as_ref(), ctx) {
            return Ok(ctx.direct_action_url_for_action_named(&name, &BTreeMap::new(), true, true));
        }
        if let Some(href) = string_in_context(self.href.as_ref(), ctx) {
            return Ok(href);
        }
        ctx.component_action_url()
    }
}

impl Element for Form {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        if !self.should_take_values(request, ctx) {
            return Ok(());
        }
        let reports = bool_in_context(self.error_report.as_ref(), ctx);
        if reports {
            ctx.push_error_report(ErrorReport::new());
        }
        let outcome = self.in_form(ctx, |template, ctx| template.take_values_from_request(request, ctx));
        if reports {
            if let Some(report) = ctx.pop_error_report() {
                self.publish_errors(report, ctx);
            }
        }
        outcome
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if !ctx.is_sender_in_subtree() {
            return Ok(ActionResult::None);
        }
        let result = self.in_form(ctx, |template, ctx| template.invoke_action(request, ctx))?;
        if result.is_none() && ctx.is_sender() {
            return self.target.perform(ctx);
        }
        Ok(result)
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if ctx.is_in_form() || ctx.is_rendering_disabled() {
            return self.in_form(ctx, |template, ctx| template.append_to_response(response, ctx));
        }
        let url = self.action_url(ctx)?;
        let method = string_in_context(self.method.as_ref(), ctx).unwrap_or_else(|| "post".to_owned());

        response.append_begin_tag("form");
        response.append_attribute("action", &url);
        response.append_attribute("method", &method);
        self.extra.append_to_response(response, ctx);
        response.append_begin_tag_end();
        self.in_form(ctx, |template, ctx| template.append_to_response(response, ctx))?;
        response.append_end_tag("form");
        Ok(())
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        walker.process_template(self, self.template.as_ref(), ctx).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;
    use woframe_core::{constant, key_path, KeyValueCoding, Request, Value};
    use woframe_runtime::ComponentDefinition;

    use super::*;
    use crate::compound::Compound;
    use crate::submit_button::SubmitButton;
    use crate::testing::{application, bindings, kp, markup, page_context, render, submit, unescape};
    use crate::text_field::TextField;

    fn order_form() -> ElementRef {
        let fields = Arc::new(Compound::new(vec![
            Arc::new(TextField::new(bindings(&[("value", kp("title"))]))),
            Arc::new(SubmitButton::new(bindings(&[("action", key_path("save")), ("value", constant("Save"))]))),
        ]));
        Arc::new(Compound::new(vec![
            markup("<h1>Order</h1>"),
            Arc::new(Form::new(bindings(&[("class", constant("order"))]), fields)),
        ]))
    }

    fn order_page() -> ComponentDefinition {
        ComponentDefinition::new("Order", order_form()).with_action("save", |page, _ctx| {
            let title = page.value_for_key("title");
            page.take_value_for_key(Value::from(format!("saved {title}")), "status")?;
            Ok(ActionResult::None)
        })
    }

    #[test]
    fn renders_a_component_action_form() {
        let app = application(vec![order_page()]);
        let (mut ctx, _page) = page_context(&app, "Order", Request::get("/wa/Order"));
        let html = render(&mut ctx);
        let session = ctx.existing_session().expect("session created for the action url");

        assert_eq!(
            unescape(&html),
            format!(
                r#"<h1>Order</h1><form action="/wo/{}/{}/1" method="post" class="order"><input type="text" name="1.0" /><input type="submit" name="1.1" value="Save" /></form>"#,
                session.session_id(),
                ctx.context_id()
            )
        );
        assert!(ctx.is_save_page_required());
        assert!(!ctx.is_in_form());
    }

    #[test]
    fn post_takes_values_then_runs_the_button_action() {
        let app = application(vec![order_page()]);
        let request = Request::post("/wo/s/c/1").with_form_body([("1.0", "Lamp"), ("1.1", "Save")]);
        let (mut ctx, page) = page_context(&app, "Order", request);
        ctx.set_sender_id(Some("1".to_owned()));

        let result = submit(&mut ctx);
        assert!(result.is_none());
        assert_eq!(ctx.active_form_element(), Some("1.1"));
        assert_eq!(page.value_for_key("status"), Value::from("saved Lamp"));
    }

    #[test]
    fn error_report_collects_input_failures() {
        let fields = Arc::new(TextField::new(bindings(&[("name", constant("qty")), ("value", constant(1))])));
        let form = Form::new(
            bindings(&[("errorReport", constant(true)), ("errors", kp("problems"))]),
            fields,
        );
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(form))]);
        let request = Request::post("/wa/Page").with_form_value("qty", "lots");
        let (mut ctx, page) = page_context(&app, "Page", request);

        submit(&mut ctx);
        let problems = page.value_for_key("problems").to_list().expect("errors list");
        assert_eq!(problems.len(), 1);
        assert!(!ctx.has_error_report());
    }

    #[traced_test]
    #[test]
    fn nested_forms_render_content_only() {
        let inner = Arc::new(Form::new(Bindings::new(), markup("x")));
        let outer = Form::new(bindings(&[("href", constant("#top"))]), inner);
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(outer))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), r##"<form action="#top" method="post">x</form>"##);
        assert!(logs_contain("nested form"));
    }

    #[test]
    fn direct_action_forms_skip_the_session() {
        let form = Form::new(bindings(&[("directActionName", constant("search"))]), markup(""));
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(form))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(unescape(&render(&mut ctx)), r#"<form action="/wa/search" method="post"></form>"#);
        assert!(!ctx.has_session());
    }
}
