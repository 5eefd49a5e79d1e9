#![forbid(unsafe_code)]

//! `<input type="text">` bound to a value.
//!
//! On top of the [`InputCore`] bindings: `trim` strips submitted text,
//! `size` and `readonly` render as attributes. An empty submission pushes
//! null.

use woframe_core::{AssociationRef, Request, Response, Value};
use woframe_runtime::component::Bindings;
use woframe_runtime::{Context, Element, Result};

use crate::dynamic::{bool_in_context, grab_association, string_in_context};
use crate::input::InputCore;

#[derive(Debug)]
pub struct TextField {
    trim: Option<AssociationRef>,
    size: Option<AssociationRef>,
    readonly: Option<AssociationRef>,
    core: InputCore,
}

impl TextField {
    pub fn new(mut bindings: Bindings) -> Self {
        let trim = grab_association(&mut bindings, "trim");
        let size = grab_association(&mut bindings, "size");
        let readonly = grab_association(&mut bindings, "readonly");
        let core = InputCore::from_bindings(bindings);
        if !core.has_write_value() {
            tracing::warn!(target: "woframe::elements", "text field without a value binding");
        }
        Self {
            trim,
            size,
            readonly,
            core,
        }
    }
}

impl Element for TextField {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        if bool_in_context(self.readonly.as_ref(), ctx) {
            return Ok(());
        }
        let Some(raw) = self.core.submitted_value(request, ctx) else {
            return Ok(());
        };
        let text = if bool_in_context(self.trim.as_ref(), ctx) {
            raw.trim()
        } else {
            raw
        };
        let value = if text.is_empty() {
            Value::Null
        } else {
            Value::from(text)
        };
        self.core.push_value(value, ctx);
        Ok(())
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if ctx.is_rendering_disabled() {
            return Ok(());
        }
        response.append_begin_tag("input");
        response.append_attribute("type", "text");
        self.core.append_core_attributes(response, ctx);
        if let Some(value) = self.core.current_value(ctx).string_value() {
            response.append_attribute("value", &value);
        }
        if let Some(size) = string_in_context(self.size.as_ref(), ctx) {
            response.append_attribute("size", &size);
        }
        if bool_in_context(self.readonly.as_ref(), ctx) {
            response.append_attribute("readonly", "readonly");
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
    use woframe_core::{constant, KeyValueCoding, Request, Value};
    use woframe_runtime::{ComponentDefinition, ErrorReport};

    use super::*;
    use crate::compound::Compound;
    use crate::testing::{application, bindings, kp, markup, page_context, render};

    #[test]
    fn renders_value_and_attributes() {
        let field = TextField::new(bindings(&[
            ("value", kp("title")),
            ("size", constant(20)),
            ("class", constant("wide")),
        ]));
        let template = Arc::new(Compound::new(vec![Arc::new(field)]));
        let app = application(vec![ComponentDefinition::new("Page", template)]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wa/Page"));
        page.take_value_for_key(Value::from("Hi \"you\""), "title").expect("seed");

        assert_eq!(
            render(&mut ctx),
            r#"<input type="text" name="0" value="Hi &quot;you&quot;" size="20" class="wide" />"#
        );
    }

    #[test]
    fn submitted_text_is_trimmed_and_pushed() {
        let field = TextField::new(bindings(&[
            ("name", constant("title")),
            ("value", kp("title")),
            ("trim", constant(true)),
        ]));
        let app = application(vec![ComponentDefinition::new("Page", markup(""))]);
        let request = Request::post("/wa/Page").with_form_value("title", "  hello ");
        let (mut ctx, page) = page_context(&app, "Page", request.clone());

        field.take_values_from_request(&request, &mut ctx).expect("take");
        assert_eq!(page.value_for_key("title"), Value::from("hello"));

        let blank = Request::post("/wa/Page").with_form_value("title", "   ");
        field.take_values_from_request(&blank, &mut ctx).expect("take");
        assert_eq!(page.value_for_key("title"), Value::Null);
    }

    #[test]
    fn readonly_fields_ignore_submissions() {
        let field = TextField::new(bindings(&[
            ("name", constant("title")),
            ("value", kp("title")),
            ("readonly", constant(true)),
        ]));
        let app = application(vec![ComponentDefinition::new("Page", markup(""))]);
        let request = Request::post("/wa/Page").with_form_value("title", "changed");
        let (mut ctx, page) = page_context(&app, "Page", request.clone());

        field.take_values_from_request(&request, &mut ctx).expect("take");
        assert_eq!(page.value_for_key("title"), Value::Null);
    }

    #[test]
    fn unsettable_binding_lands_in_the_error_report() {
        let field = TextField::new(bindings(&[("name", constant("age")), ("value", constant(3))]));
        let app = application(vec![ComponentDefinition::new("Page", markup(""))]);
        let request = Request::post("/wa/Page").with_form_value("age", "x");
        let (mut ctx, _page) = page_context(&app, "Page", request.clone());

        ctx.push_error_report(ErrorReport::new());
        field.take_values_from_request(&request, &mut ctx).expect("take");
        let report = ctx.pop_error_report().expect("report");
        let item = report.error_for_name("age").expect("error item");
        assert_eq!(item.value, Value::from("x"));
        assert_eq!(item.element_id.as_deref(), Some(""));
    }
}
