#![forbid(unsafe_code)]

//! Direct actions: bookmarkable `/{key}/{Page}/{action}` URLs.
//!
//! | Path after the key | Page | Action |
//! |--------------------|------|--------|
//! | (empty) | configured default | `default` |
//! | `A` | configured default | `A` |
//! | `A` + form `x:action` | `A` | `x` |
//! | `P/A` | `P` | `A` |
//!
//! A form action of the form `P/A` overrides both. Anything after a `.`
//! in the action is dropped (`/wa/report.pdf` runs `report`), unless the
//! action is an element ID (`@1.2.3`), which dispatches like a component
//! action on a fresh page.

use std::sync::Arc;

use woframe_core::{status, Response};

use super::RequestHandler;
use crate::context::Context;
use crate::element::{ActionResult, Element};
use crate::error::{ComponentError, Error, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectActionRequestHandler;

impl DirectActionRequestHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Resolve `(page name, action name)` from the handler path and an
/// optional form action.
pub fn resolve_direct_action(
    path: &[&str],
    form_action: Option<&str>,
    default_page: &str,
) -> (String, String) {
    let mut page: Option<String> = None;
    let mut action: Option<String> = form_action.map(str::to_owned);
    if let Some((p, a)) = form_action.and_then(|fa| fa.split_once('/')) {
        page = Some(p.to_owned());
        action = Some(a.to_owned());
    }

    match path {
        [] => {
            page.get_or_insert_with(|| default_page.to_owned());
            action.get_or_insert_with(|| "default".to_owned());
        }
        [single] => {
            if action.is_some() {
                page.get_or_insert_with(|| (*single).to_owned());
            } else {
                page = Some(default_page.to_owned());
                action = Some((*single).to_owned());
            }
        }
        [first, second, ..] => {
            page.get_or_insert_with(|| (*first).to_owned());
            action.get_or_insert_with(|| (*second).to_owned());
        }
    }

    let mut page = page.unwrap_or_default();
    let mut action = action.unwrap_or_default();
    if page.is_empty() {
        page = default_page.to_owned();
    }
    if action.is_empty() {
        action = "default".to_owned();
    }
    if !action.starts_with('@') {
        if let Some(idx) = action.find('.') {
            action.truncate(idx);
        }
    }
    (page, action)
}

impl RequestHandler for DirectActionRequestHandler {
    fn handle_context(&self, ctx: &mut Context) -> Result<Response> {
        let application = Arc::clone(ctx.application());
        let request = ctx.request_arc();

        let form_action = request.form_action();
        let (page_name, action) = resolve_direct_action(
            &request.request_handler_path_array(),
            form_action.as_deref(),
            &application.config().direct_action_page,
        );
        tracing::debug!(target: "woframe::handler", page = %page_name, action = %action, "direct action");

        let page = match ctx.page_with_name(&page_name) {
            Ok(page) => page,
            Err(err) => {
                tracing::error!(target: "woframe::handler", page = %page_name, error = %err, "could not instantiate page");
                return Ok(Response::with_status(status::NOT_FOUND));
            }
        };
        ctx.set_page(Some(page.clone()));

        let result = if let Some(sender) = action.strip_prefix('@') {
            ctx.set_sender_id(Some(sender.to_owned()));
            if page.should_take_values_from_request(&request) {
                application.take_values_from_request(&request, ctx)?;
            }
            application.invoke_action(&request, ctx)?
        } else {
            ctx.enter_component(&page, None)?;
            let outcome = (|| {
                if page.should_take_values_from_request(&request) {
                    page.take_values_from_request(&request, ctx)?;
                }
                page.perform_action_named(&action, ctx)
            })();
            ctx.leave_component(&page)?;
            match outcome {
                Err(Error::Component(ComponentError::MissingAction { action, .. })) => {
                    return Ok(application.delegate().handle_missing_action(&action, ctx));
                }
                other => other?,
            }
        };
        ctx.set_page(None);

        let result = match result {
            ActionResult::None => ActionResult::Page(page),
            other => other,
        };
        application.render_results(result, ctx)
    }
}
