#![forbid(unsafe_code)]

//! `/{key}/{session id}/{context id}[/{element id}]`: re-enters a page that
//! an earlier response rendered and dispatches to the addressed element.

use woframe_core::{status, Request, Response};

use super::RequestHandler;
use crate::context::Context;
use crate::element::ActionResult;
use crate::error::Result;

#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentRequestHandler;

impl ComponentRequestHandler {
    pub fn new() -> Self {
        Self
    }
}

impl RequestHandler for ComponentRequestHandler {
    /// The session ID travels in the URL path; [`handle_context`] restores
    /// it itself.
    ///
    /// [`handle_context`]: RequestHandler::handle_context
    fn session_id_candidates(&self, _request: &Request) -> Vec<String> {
        Vec::new()
    }

    fn handle_context(&self, ctx: &mut Context) -> Result<Response> {
        let application = std::sync::Arc::clone(ctx.application());
        let request = ctx.request_arc();

        let path = request.request_handler_path_array();
        if path.len() < 2 {
            tracing::warn!(target: "woframe::handler", uri = request.uri(), "malformed component action URL");
            return Ok(Response::with_status(status::BAD_REQUEST));
        }
        let (session_id, context_id) = (path[0], path[1]);
        // a missing element ID just re-renders the page
        if let Some(sender) = path.get(2) {
            ctx.set_sender_id(Some((*sender).to_owned()));
        }

        match ctx.existing_session() {
            Some(session) if session.session_id() != session_id => {
                tracing::warn!(
                    target: "woframe::handler",
                    url_session = session_id,
                    session = %session.session_id(),
                    "session ID mismatch in component action URL"
                );
                return Ok(Response::with_status(status::BAD_REQUEST));
            }
            Some(_) => {}
            None => {
                if let Err(err) = application.restore_session_with_id(session_id, ctx) {
                    tracing::warn!(
                        target: "woframe::handler",
                        session = session_id,
                        error = %err,
                        "could not restore component action session"
                    );
                    return Ok(application
                        .delegate()
                        .handle_session_restoration_error(ctx, Some(&err)));
                }
            }
        }

        let Some(session) = ctx.existing_session() else {
            return Ok(application.delegate().handle_session_restoration_error(ctx, None));
        };
        let Some(page) = session.restore_page_for_context_id(context_id) else {
            tracing::warn!(target: "woframe::handler", context = context_id, "could not restore page");
            return Ok(application.delegate().handle_page_restoration_error(ctx));
        };
        tracing::debug!(target: "woframe::handler", page = %page.name(), context = context_id, "restored page");
        ctx.set_page(Some(page));

        application.take_values_from_request(&request, ctx)?;
        let result = if ctx.sender_id().is_some() {
            application.invoke_action(&request, ctx)?
        } else {
            ActionResult::None
        };

        let mut response = ctx.take_response().unwrap_or_default();
        match result {
            ActionResult::Response(r) => return Ok(r),
            ActionResult::Results(results) => return Ok(results.generate_response()),
            ActionResult::Redirect(location) => return Ok(Response::redirect(&location)),
            ActionResult::Page(page) => {
                let same = ctx.page().is_some_and(|p| p.ptr_eq(&page));
                if !same {
                    ctx.set_page(Some(page));
                }
            }
            ActionResult::None => {}
            other => {
                tracing::warn!(target: "woframe::handler", result = ?other, "unexpected page request result");
            }
        }

        application.append_to_response(&mut response, ctx)?;
        Ok(response)
    }
}
