#![forbid(unsafe_code)]

//! `<a href>` pointing at an action, a page, a direct action or a URL.
//!
//! # Bindings
//!
//! | Binding | `href` |
//! |---------|--------|
//! | `action` / `pageName` | component action URL of the link's element ID |
//! | `directActionName` (`da`) | direct action URL, session ID added when one exists |
//! | `href` | used verbatim |
//! | `string` | escaped link text, rendered before the content |
//! | `disabled` | render the content without the anchor |
//! | `fragment` | appended as `#fragment` |

use std::collections::BTreeMap;

use woframe_core::{AssociationRef, Request, Response};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, Context, Element, ElementRef, ElementWalker, Result};

use crate::dynamic::{
    bool_in_context, grab_any, grab_association, string_in_context, ActionTarget, ExtraAttributes,
};
use crate::error::ElementError;

#[derive(Debug)]
pub struct Hyperlink {
    target: ActionTarget,
    direct_action_name: Option<AssociationRef>,
    href: Option<AssociationRef>,
    string: Option<AssociationRef>,
    disabled: Option<AssociationRef>,
    fragment: Option<AssociationRef>,
    extra: ExtraAttributes,
    template: Option<ElementRef>,
}

impl Hyperlink {
    pub fn new(mut bindings: Bindings, template: Option<ElementRef>) -> Result<Self, ElementError> {
        let target = ActionTarget::from_bindings(&mut bindings);
        let direct_action_name = grab_any(&mut bindings, &["directActionName", "da"]);
        let href = grab_association(&mut bindings, "href");
        let destinations =
            usize::from(target.is_bound()) + usize::from(direct_action_name.is_some()) + usize::from(href.is_some());
        if destinations > 1 {
            return Err(ElementError::ConflictingBindings {
                element: "Hyperlink",
                bindings: "'action'/'pageName', 'directActionName' and 'href'",
            });
        }
        Ok(Self {
            target,
            direct_action_name,
            href,
            string: grab_association(&mut bindings, "string"),
            disabled: grab_association(&mut bindings, "disabled"),
            fragment: grab_association(&mut bindings, "fragment"),
            extra: ExtraAttributes::from_bindings(bindings),
            template,
        })
    }

    fn href(&self, ctx: &mut Context) -> Result<Option<String>> {
        let mut url = if let Some(name) = string_in_context(self.direct_action_name.as_ref(), ctx) {
            Some(ctx.direct_action_url_for_action_named(&name, &BTreeMap::new(), true, true))
        } else if self.href.is_some() {
            string_in_context(self.href.as_ref(), ctx)
        } else if self.target.is_bound() {
            Some(ctx.component_action_url()?)
        } else {
            None
        };
        if let Some(fragment) = string_in_context(self.fragment.as_ref(), ctx) {
            let url = url.get_or_insert_with(String::new);
            url.push('#');
            url.push_str(&fragment);
        }
        Ok(url)
    }

    fn append_content(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if let Some(text) = string_in_context(self.string.as_ref(), ctx) {
            response.append_content_html_string(&text);
        }
        match &self.template {
            Some(template) => template.append_to_response(response, ctx),
            None => Ok(()),
        }
    }
}

impl Element for Hyperlink {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        match &self.template {
            Some(template) => template.take_values_from_request(request, ctx),
            None => Ok(()),
        }
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if ctx.is_sender() {
            if bool_in_context(self.disabled.as_ref(), ctx) {
                return Ok(ActionResult::None);
            }
            return self.target.perform(ctx);
        }
        match &self.template {
            Some(template) if ctx.is_sender_in_subtree() => template.invoke_action(request, ctx),
            _ => Ok(ActionResult::None),
        }
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if ctx.is_rendering_disabled() {
            return Ok(());
        }
        if bool_in_context(self.disabled.as_ref(), ctx) {
            return self.append_content(response, ctx);
        }
        response.append_begin_tag("a");
        if let Some(href) = self.href(ctx)? {
            response.append_attribute("href", &href);
        }
        self.extra.append_to_response(response, ctx);
        response.append_begin_tag_end();
        self.append_content(response, ctx)?;
        response.append_end_tag("a");
        Ok(())
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        match &self.template {
            Some(template) => walker.process_template(self, template.as_ref(), ctx).map(|_| ()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use woframe_core::{constant, key_path, KeyValueCoding, Request, Value};
    use woframe_runtime::ComponentDefinition;

    use super::*;
    use crate::compound::Compound;
    use crate::repetition::Repetition;
    use crate::testing::{application, bindings, kp, markup, page_context, render, submit, unescape};

    #[test]
    fn action_links_address_their_element() {
        let link = Hyperlink::new(
            bindings(&[("action", key_path("next")), ("string", constant("More & more"))]),
            None,
        )
        .expect("link");
        let template = Arc::new(Compound::new(vec![markup("<p>"), Arc::new(link)]));
        let app = application(vec![ComponentDefinition::new("Page", template)]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        let html = unescape(&render(&mut ctx));
        let session = ctx.existing_session().expect("session");
        assert_eq!(
            html,
            format!(
                r#"<p><a href="/wo/{}/{}/1">More & more</a>"#,
                session.session_id(),
                ctx.context_id()
            )
        );
    }

    #[test]
    fn clicking_a_row_link_runs_with_that_row() {
        let link = Hyperlink::new(bindings(&[("action", key_path("pick"))]), Some(markup("x"))).expect("link");
        let rep = Repetition::new(bindings(&[("list", kp("rows")), ("item", kp("row"))]), Arc::new(link))
            .expect("rep");
        let app = application(vec![
            ComponentDefinition::new("Page", Arc::new(rep)).with_action("pick", |page, _ctx| {
                let row = page.value_for_key("row");
                page.take_value_for_key(row, "picked")?;
                Ok(ActionResult::None)
            }),
        ]);
        let (mut ctx, page) = page_context(&app, "Page", Request::get("/wo/s/c/1"));
        page.take_value_for_key(Value::from(vec!["a", "b", "c"]), "rows").expect("rows");
        ctx.set_sender_id(Some("1".to_owned()));

        submit(&mut ctx);
        assert_eq!(page.value_for_key("picked"), Value::from("b"));
    }

    #[test]
    fn direct_action_links_and_fragments() {
        let link = Hyperlink::new(
            bindings(&[("da", constant("search")), ("fragment", constant("results"))]),
            Some(markup("Find")),
        )
        .expect("link");
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(link))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(unescape(&render(&mut ctx)), r#"<a href="/wa/search#results">Find</a>"#);
        assert!(!ctx.has_session());
    }

    #[test]
    fn disabled_links_render_content_only() {
        let link = Hyperlink::new(
            bindings(&[("href", constant("https://example.org")), ("disabled", constant(true))]),
            Some(markup("plain")),
        )
        .expect("link");
        let app = application(vec![ComponentDefinition::new("Page", Arc::new(link))]);
        let (mut ctx, _page) = page_context(&app, "Page", Request::get("/wa/Page"));

        assert_eq!(render(&mut ctx), "plain");
    }

    #[test]
    fn one_destination_only() {
        let err = Hyperlink::new(bindings(&[("href", constant("a")), ("pageName", constant("B"))]), None)
            .unwrap_err();
        assert!(matches!(err, ElementError::ConflictingBindings { element: "Hyperlink", .. }));
    }
}
