#![forbid(unsafe_code)]

//! Render a template once per list item.
//!
//! # Bindings
//!
//! | Binding | Meaning |
//! |---------|---------|
//! | `list` | values to iterate; lists, maps (by value) and single values |
//! | `count` | iterate `0..count` instead of a list |
//! | `item` | written with the current value before each pass |
//! | `index` | written with the current position before each pass |
//! | `separator` | raw markup rendered between passes |
//!
//! # Invariants
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Addressing | pass `n` renders under segment `n` of one extra segment |
//! | Empty list | no segment is pushed at all |
//! | Balance | the segment is popped on every exit path |
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `item`/`index` not settable | logged once per pass, rendering continues |
//! | both `list` and `count` bound | construction error |

use woframe_core::{AssociationRef, Request, Response, Value};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, Result};

use crate::dynamic::{grab_association, set_in_context, string_in_context, value_in_context};
use crate::error::ElementError;

#[derive(Debug)]
pub struct Repetition {
    list: Option<AssociationRef>,
    count: Option<AssociationRef>,
    item: Option<AssociationRef>,
    index: Option<AssociationRef>,
    separator: Option<AssociationRef>,
    template: ElementRef,
}

impl Repetition {
    pub fn new(mut bindings: Bindings, template: ElementRef) -> Result<Self, ElementError> {
        let list = grab_association(&mut bindings, "list");
        let count = grab_association(&mut bindings, "count");
        match (&list, &count) {
            (None, None) => {
                return Err(ElementError::MissingBinding {
                    element: "Repetition",
                    binding: "list",
                });
            }
            (Some(_), Some(_)) => {
                return Err(ElementError::ConflictingBindings {
                    element: "Repetition",
                    bindings: "'list' and 'count'",
                });
            }
            _ => {}
        }
        let item = grab_association(&mut bindings, "item");
        let index = grab_association(&mut bindings, "index");
        let separator = grab_association(&mut bindings, "separator");
        if !bindings.is_empty() {
            tracing::warn!(
                target: "woframe::elements",
                unused = ?bindings.keys().collect::<Vec<_>>(),
                "repetition ignores extra bindings"
            );
        }
        Ok(Self {
            list,
            count,
            item,
            index,
            separator,
            template,
        })
    }

    /// Pass values. `count` is never materialized.
    fn items(&self, ctx: &Context) -> Box<dyn Iterator<Item = Value>> {
        if let Some(count) = &self.count {
            let n = value_in_context(count.as_ref(), ctx).int_value().max(0);
            return Box::new((0..n).map(Value::Int));
        }
        let Some(list) = &self.list else {
            return Box::new(std::iter::empty());
        };
        Box::new(value_in_context(list.as_ref(), ctx).to_list().unwrap_or_default().into_iter())
    }

    fn prepare_pass(&self, position: usize, item: &Value, ctx: &Context) {
        if let Some(assoc) = &self.item {
            if let Err(err) = set_in_context(assoc.as_ref(), item.clone(), ctx) {
                tracing::warn!(target: "woframe::elements", position, error = %err, "could not set repetition item");
            }
        }
        if let Some(assoc) = &self.index {
            if let Err(err) = set_in_context(assoc.as_ref(), Value::from(position), ctx) {
                tracing::warn!(target: "woframe::elements", position, error = %err, "could not set repetition index");
            }
        }
    }

    /// Run `phase` once per item. Stops early at the first `Some`.
    fn each_pass<T>(
        &self,
        ctx: &mut Context,
        mut phase: impl FnMut(usize, &dyn Element, &mut Context) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let mut items = self.items(ctx).peekable();
        if items.peek().is_none() {
            return Ok(None);
        }
        ctx.element_id_mut().append_zero();
        let mut outcome = Ok(None);
        for (position, item) in items.enumerate() {
            self.prepare_pass(position, &item, ctx);
            match phase(position, self.template.as_ref(), ctx) {
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

impl Element for Repetition {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.each_pass(ctx, |_, template, ctx| {
            template.take_values_from_request(request, ctx)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if !ctx.is_sender_in_subtree() {
            return Ok(ActionResult::None);
        }
        let result = self.each_pass(ctx, |_, template, ctx| {
            let result = template.invoke_action(request, ctx)?;
            Ok((!result.is_none()).then_some(result))
        })?;
        Ok(result.unwrap_or_default())
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        let separator = string_in_context(self.separator.as_ref(), ctx);
        self.each_pass(ctx, |position, template, ctx| {
            if position > 0 {
                if let Some(separator) = &separator {
                    response.append_content_string(separator);
                }
            }
            template.append_to_response(response, ctx)?;
            Ok(None::<()>)
        })?;
        Ok(())
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        self.each_pass(ctx, |_, template, ctx| {
            let descend = walker.process_template(self, template, ctx)?;
            Ok((!descend).then_some(()))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use woframe_core::{constant, KeyValueCoding, Request, Value};
    use woframe_runtime::{ComponentDefinition, FnWalker};

    use super::*;
    use crate::compound::Compound;
    use crate::string::DynamicString;
    use crate::testing::{application, bindings, kp, markup, page_context, probe, render};

    fn show(path: &str) -> ElementRef {
        Arc::new(DynamicString::new(bindings(&[("value", kp(path))])).expect("string"))
    }

    #[test]
    fn items_and_indexes_are_pushed_per_pass() {
        let row = Arc::new(Compound::new(vec![show("index"), markup(":"), show("item"), probe()]));
        let rep = Repetition::new(
            bindings(&[
                ("list", kp("colors")),
                ("item", kp("item")),
                ("index", kp("index")),
                ("separator", constant(", ")),
            ]),
            row,
        )
        .expect("rep");
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(rep))]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wa/Page"));
        page.take_value_for_key(Value::from(vec!["red", "green"]), "colors").expect("colors");

        assert_eq!(render(&mut ctx), "0:red[0.3], 1:green[1.3]");
        assert_eq!(page.value_for_key("item"), Value::from("green"));
    }

    #[test]
    fn empty_list_pushes_nothing() {
        let rep = Repetition::new(bindings(&[("list", kp("nothing"))]), probe()).expect("rep");
        let template = Arc::new(Compound::new(vec![Arc::new(rep), probe()]));
        let app = application(vec![ComponentDefinition::new("Page", template)]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), "[1]");
    }

    #[test]
    fn count_iterates_a_range() {
        let rep = Repetition::new(bindings(&[("count", constant(3))]), probe()).expect("rep");
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(rep))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), "[0][1][2]");
    }

    #[test]
    fn huge_count_is_walked_lazily() {
        let rep = Repetition::new(bindings(&[("count", constant(i64::MAX))]), probe()).expect("rep");
        let app = application(vec![ComponentDefinition::new("Page", markup(""))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        let mut seen = 0;
        let mut walker = FnWalker(|_: &dyn Element, _: &Context| {
            seen += 1;
            seen < 3
        });
        rep.walk_template(&mut walker, &mut ctx).expect("walk");
        drop(walker);

        assert_eq!(seen, 3);
        assert!(ctx.element_id().is_empty());
    }

    #[test]
    fn list_and_count_conflict() {
        let err = Repetition::new(bindings(&[("list", kp("a")), ("count", constant(1))]), probe())
            .unwrap_err();
        assert!(matches!(err, ElementError::ConflictingBindings { .. }));
        assert!(Repetition::new(Bindings::new(), probe()).is_err());
    }
}
