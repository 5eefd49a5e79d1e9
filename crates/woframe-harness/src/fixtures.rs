#![forbid(unsafe_code)]

//! Reference pages exercised by the end-to-end tests.
//!
//! # Guestbook (`Main`)
//!
//! | Element ID | Element |
//! |------------|---------|
//! | `1` | form (component action) |
//! | `1.0` | text field named `title` |
//! | `1.1` | submit button running `add` |
//! | `3` | repetition over `entries` |
//! | `5` | link running `clear` |
//! | `6` | direct action link to `default` |
//!
//! Entries live in the session under `entries` and are mirrored into the
//! page, so both component actions and direct actions see them.
//!
//! # Counter (`Counter`)
//!
//! A page holding `count` with one link (`1`) that increments it. Each
//! click renders under a new context ID, which makes it the page used for
//! backtracking tests.

use std::sync::Arc;

use woframe_core::{constant, key_path, AssociationRef, KeyValueCoding, Response, Value};
use woframe_elements::{
    Compound, DynamicString, ElementError, Form, Hyperlink, Repetition, SubmitButton, TextField,
};
use woframe_runtime::component::Bindings;
use woframe_runtime::{
    ActionResult, ComponentDefinition, ComponentRef, Context, Element, ElementRef, Result,
};

/// Literal markup.
#[derive(Debug)]
pub struct Markup(pub &'static str);

impl Element for Markup {
    fn append_to_response(&self, response: &mut Response, _ctx: &mut Context) -> Result<()> {
        response.append_content_string(self.0);
        Ok(())
    }
}

pub fn markup(text: &'static str) -> ElementRef {
    Arc::new(Markup(text))
}

/// Build a binding map from `(name, association)` pairs.
pub fn bindings(pairs: &[(&str, AssociationRef)]) -> Bindings {
    pairs
        .iter()
        .map(|(name, association)| ((*name).to_owned(), Arc::clone(association)))
        .collect()
}

// ---------------------------------------------------------------------------
// Guestbook
// ---------------------------------------------------------------------------

const ENTRIES: &str = "entries";

fn session_entries(ctx: &Context) -> Vec<Value> {
    ctx.existing_session()
        .and_then(|session| session.value_for_key(ENTRIES).to_list())
        .unwrap_or_default()
}

fn store_entries(page: &ComponentRef, ctx: &mut Context, entries: Vec<Value>) -> Result<()> {
    let session = ctx.session()?;
    session.take_value_for_key(Value::List(entries.clone()), ENTRIES)?;
    page.take_value_for_key(Value::List(entries), ENTRIES)?;
    Ok(())
}

fn add_entry(page: &ComponentRef, ctx: &mut Context) -> Result<ActionResult> {
    let title = page.value_for_key("title");
    if title.is_null() {
        tracing::debug!(target: "woframe::fixtures", "empty title, nothing added");
        return Ok(ActionResult::None);
    }
    let mut entries = session_entries(ctx);
    entries.push(title);
    store_entries(page, ctx, entries)?;
    page.take_value_for_key(Value::Null, "title")?;
    Ok(ActionResult::None)
}

/// The guestbook page, registered as `Main`.
pub fn guestbook() -> Result<ComponentDefinition, ElementError> {
    let form = Form::new(
        Bindings::new(),
        Arc::new(Compound::new(vec![
            Arc::new(TextField::new(bindings(&[
                ("name", constant("title")),
                ("value", key_path("title")),
                ("trim", constant(true)),
            ]))),
            Arc::new(SubmitButton::new(bindings(&[
                ("action", key_path("add")),
                ("value", constant("Add")),
            ]))),
        ])),
    );
    let row = Compound::new(vec![
        markup("<li>"),
        Arc::new(DynamicString::new(bindings(&[("value", key_path("entry"))]))?),
        markup("</li>"),
    ]);
    let entries = Repetition::new(
        bindings(&[("list", key_path(ENTRIES)), ("item", key_path("entry"))]),
        Arc::new(row),
    )?;
    let clear = Hyperlink::new(
        bindings(&[("action", key_path("clear")), ("string", constant("Clear"))]),
        None,
    )?;
    let reload = Hyperlink::new(
        bindings(&[("directActionName", constant("default")), ("string", constant("Reload"))]),
        None,
    )?;
    let template = Compound::new(vec![
        markup("<h1>Guestbook</h1>"),
        Arc::new(form),
        markup("<ul>"),
        Arc::new(entries),
        markup("</ul>"),
        Arc::new(clear),
        Arc::new(reload),
    ]);

    Ok(ComponentDefinition::new("Main", Arc::new(template))
        .with_action("default", |page, ctx| {
            let entries = session_entries(ctx);
            page.take_value_for_key(Value::List(entries), ENTRIES)?;
            Ok(ActionResult::None)
        })
        .with_action("add", add_entry)
        .with_action("submit", add_entry)
        .with_action("clear", |page, ctx| {
            store_entries(page, ctx, Vec::new())?;
            Ok(ActionResult::None)
        })
        .with_action("count", |_page, ctx| {
            Ok(ActionResult::Text(format!("{} entries", session_entries(ctx).len())))
        })
        .with_action("logout", |_page, ctx| {
            if let Some(session) = ctx.existing_session() {
                session.terminate();
            }
            Ok(ActionResult::Text("bye".to_owned()))
        })
        .with_action("boom", |_page, _ctx| panic!("kaboom")))
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// The counter page, registered as `Counter`.
pub fn counter() -> Result<ComponentDefinition, ElementError> {
    let template = Compound::new(vec![
        markup("<p>count "),
        Arc::new(DynamicString::new(bindings(&[
            ("value", key_path("count")),
            ("valueWhenEmpty", constant("0")),
        ]))?),
        markup("</p>"),
        Arc::new(Hyperlink::new(
            bindings(&[("action", key_path("increment")), ("string", constant("more"))]),
            None,
        )?),
    ]);
    Ok(ComponentDefinition::new("Counter", Arc::new(template))
        .with_action("default", |_page, _ctx| Ok(ActionResult::None))
        .with_action("increment", |page, _ctx| {
            let next = match page.value_for_key("count") {
                Value::Int(n) => n + 1,
                _ => 1,
            };
            page.take_value_for_key(Value::Int(next), "count")?;
            Ok(ActionResult::None)
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_build() {
        let main = guestbook().expect("guestbook");
        assert_eq!(main.name(), "Main");
        for action in ["default", "add", "submit", "clear", "count", "logout", "boom"] {
            assert!(main.action(action).is_some(), "{action}");
        }
        assert!(counter().expect("counter").action("increment").is_some());
    }
}
