#![forbid(unsafe_code)]

//! Bindings and behavior shared by form inputs.
//!
//! | Binding | Meaning |
//! |---------|---------|
//! | `name` | form field name; defaults to the element ID |
//! | `id` | rendered `id` attribute |
//! | `value` | read for rendering and written on submit |
//! | `readValue` / `writeValue` | split the two directions of `value` |
//! | `disabled` | skip rendering the value and ignore submits |
//!
//! Anything else is kept as [`ExtraAttributes`].

use woframe_core::{AssociationRef, Request, Response, Value};
use woframe_runtime::component::Bindings;
use woframe_runtime::Context;

use crate::dynamic::{
    bool_in_context, grab_association, set_in_context, string_in_context, value_in_context,
    ExtraAttributes,
};

#[derive(Debug, Default)]
pub struct InputCore {
    name: Option<AssociationRef>,
    id: Option<AssociationRef>,
    read_value: Option<AssociationRef>,
    write_value: Option<AssociationRef>,
    disabled: Option<AssociationRef>,
    extra: ExtraAttributes,
}

impl InputCore {
    /// Grab the common bindings. Call after the element took its own
    /// bindings; the rest become extra attributes.
    pub fn from_bindings(mut bindings: Bindings) -> Self {
        let value = grab_association(&mut bindings, "value");
        let read_value = grab_association(&mut bindings, "readValue").or_else(|| value.clone());
        let write_value = grab_association(&mut bindings, "writeValue").or(value);
        Self {
            name: grab_association(&mut bindings, "name"),
            id: grab_association(&mut bindings, "id"),
            read_value,
            write_value,
            disabled: grab_association(&mut bindings, "disabled"),
            extra: ExtraAttributes::from_bindings(bindings),
        }
    }

    /// The form field name at the cursor.
    pub fn element_name(&self, ctx: &Context) -> String {
        string_in_context(self.name.as_ref(), ctx)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ctx.element_id().as_str().to_owned())
    }

    pub fn is_disabled(&self, ctx: &Context) -> bool {
        bool_in_context(self.disabled.as_ref(), ctx)
    }

    pub fn has_write_value(&self) -> bool {
        self.write_value.is_some()
    }

    /// The value to render.
    pub fn current_value(&self, ctx: &Context) -> Value {
        self.read_value
            .as_ref()
            .map_or(Value::Null, |assoc| value_in_context(assoc.as_ref(), ctx))
    }

    /// The submitted form value for this input, if the request carries one.
    pub fn submitted_value<'r>(&self, request: &'r Request, ctx: &Context) -> Option<&'r str> {
        if self.is_disabled(ctx) {
            return None;
        }
        request.form_value(&self.element_name(ctx))
    }

    /// Push `value` into the write binding. Failures land in the innermost
    /// error report, or the log when there is none.
    pub fn push_value(&self, value: Value, ctx: &mut Context) {
        let Some(assoc) = &self.write_value else {
            return;
        };
        if let Err(err) = set_in_context(assoc.as_ref(), value.clone(), ctx) {
            let name = self.element_name(ctx);
            let element_id = ctx.element_id().as_str().to_owned();
            match ctx.error_report_mut() {
                Some(report) => report.add_error_for_field(&element_id, &name, value, err.to_string()),
                None => tracing::warn!(
                    target: "woframe::forms",
                    element_id = %element_id,
                    name = %name,
                    error = %err,
                    "could not push form value"
                ),
            }
        }
    }

    /// ` id="…" name="…"` and `disabled` when it applies.
    pub fn append_core_attributes(&self, response: &mut Response, ctx: &Context) {
        if let Some(id) = string_in_context(self.id.as_ref(), ctx) {
            response.append_attribute("id", &id);
        }
        response.append_attribute("name", &self.element_name(ctx));
        if self.is_disabled(ctx) {
            response.append_attribute("disabled", "disabled");
        }
    }

    pub fn append_extra_attributes(&self, response: &mut Response, ctx: &Context) {
        self.extra.append_to_response(response, ctx);
    }
}
