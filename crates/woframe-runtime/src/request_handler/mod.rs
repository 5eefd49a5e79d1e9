#![forbid(unsafe_code)]

//! Request handlers and the shared request pipeline.
//!
//! The application picks a handler by the first path segment after the
//! URL prefix (the request handler key). Every handler runs through
//! [`handle_request`], which owns the transaction skeleton:
//!
//! ```text
//! received ─▶ session resolution ─▶ handler (take values ─▶ invoke ─▶ render)
//!                   │                          │
//!                   ▼                          ▼ Err
//!        restoration error response    handle_exception
//!                   └──────────────┬───────────┘
//!                                  ▼
//!          sleep components ─▶ save page ─▶ check in session ─▶ done
//! ```
//!
//! The teardown runs on every path, so a failed request never leaves its
//! session checked out. A panic unwinding through the pipeline drops the
//! [`Context`], whose drop guard releases the reservation.

mod component;
mod direct_action;

use std::fmt;
use std::sync::Arc;

use woframe_core::{status, Request, Response};

pub use component::ComponentRequestHandler;
pub use direct_action::DirectActionRequestHandler;

use crate::application::Application;
use crate::context::Context;
use crate::error::Result;

/// Handles the requests addressed to one request handler key.
pub trait RequestHandler: Send + Sync + fmt::Debug {
    /// Session IDs to try, in order. Empty means "no session requested".
    fn session_id_candidates(&self, request: &Request) -> Vec<String> {
        request.session_id_candidates()
    }

    fn restores_sessions_using_ids(&self) -> bool {
        true
    }

    /// Whether to create a session for requests that do not name one.
    fn autocreates_session(&self, ctx: &Context) -> bool {
        ctx.application().config().autocreate_session
    }

    fn rejects_favicon(&self) -> bool {
        true
    }

    /// Handler specific processing, with the session (if any) attached.
    fn handle_context(&self, ctx: &mut Context) -> Result<Response>;
}

fn is_favicon(request: &Request) -> bool {
    request.path() == "/favicon.ico" || request.path().ends_with("/favicon.ico")
}

/// Run one request through `handler`.
pub fn handle_request(
    handler: &dyn RequestHandler,
    application: &Arc<Application>,
    request: Arc<Request>,
) -> Response {
    if handler.rejects_favicon() && is_favicon(&request) {
        tracing::debug!(target: "woframe::handler", "rejecting favicon request");
        return Response::with_status(status::NOT_FOUND);
    }

    let mut ctx = Context::new(Arc::clone(application), Arc::clone(&request));
    let candidates = handler.session_id_candidates(&request);
    tracing::debug!(
        target: "woframe::handler",
        context = ctx.context_id(),
        handler = ?handler,
        session_ids = candidates.len(),
        "handle request"
    );

    application.delegate().awake(application);
    let response = match run_phases(handler, application, &mut ctx, &candidates) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                target: "woframe::handler",
                context = ctx.context_id(),
                error = %err,
                "request failed"
            );
            application.delegate().handle_exception(&err, &mut ctx)
        }
    };
    finish_transaction(application, &mut ctx);
    application.delegate().sleep(application);
    response
}

fn run_phases(
    handler: &dyn RequestHandler,
    application: &Arc<Application>,
    ctx: &mut Context,
    candidates: &[String],
) -> Result<Response> {
    if handler.restores_sessions_using_ids() {
        if !candidates.is_empty() {
            if let Err(err) = application.restore_session_from_candidates(candidates, ctx) {
                return Ok(application
                    .delegate()
                    .handle_session_restoration_error(ctx, Some(&err)));
            }
        } else if handler.autocreates_session(ctx) {
            if application.config().refuses_new_sessions {
                tracing::info!(target: "woframe::handler", "new sessions refused");
                return Ok(application.delegate().handle_session_restoration_error(ctx, None));
            }
            ctx.session()?;
        }
    }
    handler.handle_context(ctx)
}

/// Sleep, persist and release. Never fails; problems are logged.
fn finish_transaction(application: &Arc<Application>, ctx: &mut Context) {
    ctx.sleep_components();

    if ctx.is_save_page_required() {
        match (ctx.page(), ctx.existing_session()) {
            (Some(page), Some(session)) => session.save_page(&page, ctx.context_id()),
            (Some(_), None) => {
                tracing::error!(target: "woframe::handler", context = ctx.context_id(), "got no session to save page");
            }
            (None, _) => {
                tracing::warn!(target: "woframe::handler", context = ctx.context_id(), "save page requested, but context has no page");
            }
        }
    }

    if let Some(session) = ctx.existing_session() {
        session.sleep();
        if let Err(err) = application.session_store().check_in_session(&session, ctx) {
            tracing::error!(
                target: "woframe::handler",
                session = %session.session_id(),
                error = %err,
                "could not save session"
            );
        }
        ctx.mark_session_checked_in();
    }
}
