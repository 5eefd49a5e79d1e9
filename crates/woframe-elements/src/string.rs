#![forbid(unsafe_code)]

//! Render a value as text.
//!
//! `value` renders the bound value; `%value` instead reads a pattern and
//! substitutes `%(keyPath)s` tokens against the active component.
//! `valueWhenEmpty` replaces a null or empty result. Output is HTML escaped
//! unless `escapeHTML` is false; `insertBR` turns newlines into `<br />`.

use woframe_core::{pattern, AssociationRef, Record, Response};
use woframe_runtime::component::Bindings;
use woframe_runtime::{Context, Element, Result};

use crate::dynamic::{grab_association, string_in_context, value_in_context};
use crate::error::ElementError;

#[derive(Debug)]
enum Source {
    Value(AssociationRef),
    Pattern(AssociationRef),
}

#[derive(Debug)]
pub struct DynamicString {
    source: Source,
    value_when_empty: Option<AssociationRef>,
    escape_html: Option<AssociationRef>,
    insert_br: Option<AssociationRef>,
}

impl DynamicString {
    pub fn new(mut bindings: Bindings) -> Result<Self, ElementError> {
        let value = grab_association(&mut bindings, "value");
        let pattern = grab_association(&mut bindings, "%value");
        let source = match (value, pattern) {
            (Some(value), None) => Source::Value(value),
            (None, Some(pattern)) => Source::Pattern(pattern),
            (Some(_), Some(_)) => {
                return Err(ElementError::ConflictingBindings {
                    element: "String",
                    bindings: "'value' and '%value'",
                });
            }
            (None, None) => {
                return Err(ElementError::MissingBinding {
                    element: "String",
                    binding: "value",
                });
            }
        };
        let value_when_empty = grab_association(&mut bindings, "valueWhenEmpty");
        let escape_html = grab_association(&mut bindings, "escapeHTML");
        let insert_br = grab_association(&mut bindings, "insertBR");
        if !bindings.is_empty() {
            tracing::warn!(
                target: "woframe::elements",
                unused = ?bindings.keys().collect::<Vec<_>>(),
                "string ignores extra bindings"
            );
        }
        Ok(Self {
            source,
            value_when_empty,
            escape_html,
            insert_br,
        })
    }

    /// The text this element renders at the cursor, before escaping.
    pub fn text_in_context(&self, ctx: &Context) -> Option<String> {
        let text = match &self.source {
            Source::Value(assoc) => value_in_context(assoc.as_ref(), ctx).string_value(),
            Source::Pattern(assoc) => value_in_context(assoc.as_ref(), ctx)
                .string_value()
                .map(|p| match ctx.cursor() {
                    Some(cursor) => pattern::format(&p, &cursor),
                    None => pattern::format(&p, &Record::default()),
                }),
        };
        match text {
            Some(text) if !text.is_empty() => Some(text),
            _ => string_in_context(self.value_when_empty.as_ref(), ctx),
        }
    }

    fn escapes(&self, ctx: &Context) -> bool {
        self.escape_html
            .as_ref()
            .is_none_or(|assoc| value_in_context(assoc.as_ref(), ctx).bool_value())
    }
}

impl Element for DynamicString {
    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if ctx.is_rendering_disabled() {
            return Ok(());
        }
        let Some(text) = self.text_in_context(ctx) else {
            return Ok(());
        };
        let insert_br = self
            .insert_br
            .as_ref()
            .is_some_and(|assoc| value_in_context(assoc.as_ref(), ctx).bool_value());
        let escape = self.escapes(ctx);

        for (n, line) in text.split('\n').enumerate() {
            if n > 0 {
                response.append_content_string(if insert_br { "<br />" } else { "\n" });
            }
            if escape {
                response.append_content_html_string(line);
            } else {
                response.append_content_string(line);
            }
        }
        Ok(())
    }
}
