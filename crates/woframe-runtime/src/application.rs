#![forbid(unsafe_code)]

//! The application: configuration, collaborators and request dispatch.
//!
//! An [`Application`] is built once and shared (`Arc`) by every request
//! thread. It owns no per-request state; counters are atomics and the
//! collaborators (resource manager, session store, delegate, association
//! registry) are themselves thread-safe.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(ComponentRegistry::new());
//! registry.register(ComponentDefinition::new("Main", template));
//! let app = Application::builder()
//!     .config(ApplicationConfig::default())
//!     .resource_manager(registry)
//!     .build();
//! let response = app.dispatch_request(Request::get("/wa/Main/default"));
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use woframe_core::{status, AssociationRegistry, Request, Response, Value};

use crate::component::ComponentRef;
use crate::config::ApplicationConfig;
use crate::context::Context;
use crate::element::{ActionResult, Element};
use crate::error::{ComponentError, Error, Result, SessionStoreError};
use crate::request_handler::{
    handle_request, ComponentRequestHandler, DirectActionRequestHandler, RequestHandler,
};
use crate::resource_manager::{instantiate_component, ComponentRegistry, ResourceManager};
use crate::session::{generate_session_id, Session, SessionRef};
use crate::session_store::{ServerSessionStore, SessionStore};

// ---------------------------------------------------------------------------
// Delegate
// ---------------------------------------------------------------------------

/// Application level hooks. Every method has a working default.
pub trait ApplicationDelegate: Send + Sync + fmt::Debug {
    fn awake(&self, _application: &Application) {}

    fn sleep(&self, _application: &Application) {}

    /// Build the session object for a freshly minted ID.
    fn create_session(&self, id: String, application: &Application) -> Session {
        Session::new(id, application.config())
    }

    fn handle_exception(&self, error: &Error, _ctx: &mut Context) -> Response {
        let mut response = Response::with_status(status::INTERNAL_ERROR);
        response.append_content_html_string(&format!("fail: {error}"));
        response
    }

    fn handle_session_restoration_error(
        &self,
        ctx: &mut Context,
        error: Option<&SessionStoreError>,
    ) -> Response {
        let mut response = Response::new();
        let detail = error.map_or_else(|| format!("{ctx:?}"), ToString::to_string);
        response.append_content_html_string(&format!("sn fail: {detail}"));
        response
    }

    fn handle_page_restoration_error(&self, ctx: &mut Context) -> Response {
        tracing::warn!(target: "woframe::app", context = ctx.context_id(), "could not restore page from context");
        let mut response = Response::with_status(status::INTERNAL_ERROR);
        response.append_content_string("<h1>You have backtracked too far</h1>");
        response
    }

    fn handle_missing_action(&self, action: &str, _ctx: &mut Context) -> Response {
        let mut response = Response::new();
        response.append_content_html_string(&format!("missing action: {action}"));
        response
    }
}

/// The stock delegate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl ApplicationDelegate for DefaultDelegate {}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ApplicationBuilder {
    config: Option<ApplicationConfig>,
    resource_manager: Option<Arc<dyn ResourceManager>>,
    session_store: Option<Arc<dyn SessionStore>>,
    delegate: Option<Arc<dyn ApplicationDelegate>>,
    associations: Option<Arc<AssociationRegistry>>,
    handlers: Vec<(String, Arc<dyn RequestHandler>)>,
    query_session_keys: Vec<String>,
}

impl ApplicationBuilder {
    #[must_use]
    pub fn config(mut self, config: ApplicationConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn resource_manager(mut self, rm: Arc<dyn ResourceManager>) -> Self {
        self.resource_manager = Some(rm);
        self
    }

    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    #[must_use]
    pub fn delegate(mut self, delegate: Arc<dyn ApplicationDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    #[must_use]
    pub fn associations(mut self, registry: AssociationRegistry) -> Self {
        self.associations = Some(Arc::new(registry));
        self
    }

    /// Register (or replace) the handler for `key`.
    #[must_use]
    pub fn request_handler(mut self, key: &str, handler: Arc<dyn RequestHandler>) -> Self {
        self.handlers.push((key.to_owned(), handler));
        self
    }

    /// Request values carried into direct action URLs.
    #[must_use]
    pub fn query_session_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_session_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Arc<Application> {
        let config = self.config.unwrap_or_default();
        let session_store = self.session_store.unwrap_or_else(|| {
            Arc::new(ServerSessionStore::new(Duration::from_millis(
                config.session_checkout_timeout_ms,
            )))
        });

        let mut handlers: AHashMap<String, Arc<dyn RequestHandler>> = AHashMap::new();
        handlers.insert(
            config.component_request_handler_key.clone(),
            Arc::new(ComponentRequestHandler::new()),
        );
        handlers.insert(
            config.direct_action_request_handler_key.clone(),
            Arc::new(DirectActionRequestHandler::new()),
        );
        for (key, handler) in self.handlers {
            handlers.insert(key, handler);
        }

        tracing::info!(
            target: "woframe::app",
            name = %config.name,
            handlers = handlers.len(),
            page_cache_size = config.page_cache_size,
            "application ready"
        );

        Arc::new(Application {
            resource_manager: self
                .resource_manager
                .unwrap_or_else(|| Arc::new(ComponentRegistry::new())),
            session_store,
            delegate: self.delegate.unwrap_or_else(|| Arc::new(DefaultDelegate)),
            associations: self
                .associations
                .unwrap_or_else(|| Arc::new(AssociationRegistry::new())),
            handlers,
            query_session_keys: self.query_session_keys,
            context_counter: AtomicU64::new(0),
            session_counter: AtomicU64::new(0),
            request_counter: AtomicU64::new(0),
            config,
        })
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub struct Application {
    config: ApplicationConfig,
    resource_manager: Arc<dyn ResourceManager>,
    session_store: Arc<dyn SessionStore>,
    delegate: Arc<dyn ApplicationDelegate>,
    associations: Arc<AssociationRegistry>,
    handlers: AHashMap<String, Arc<dyn RequestHandler>>,
    query_session_keys: Vec<String>,
    context_counter: AtomicU64,
    session_counter: AtomicU64,
    request_counter: AtomicU64,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Application")
            .field("name", &self.config.name)
            .field("handlers", &keys)
            .field("resource_manager", &self.resource_manager)
            .finish_non_exhaustive()
    }
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    pub fn resource_manager(&self) -> Arc<dyn ResourceManager> {
        Arc::clone(&self.resource_manager)
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.session_store
    }

    pub fn delegate(&self) -> &Arc<dyn ApplicationDelegate> {
        &self.delegate
    }

    pub fn associations(&self) -> &AssociationRegistry {
        &self.associations
    }

    pub fn query_session_keys(&self) -> &[String] {
        &self.query_session_keys
    }

    pub fn request_handler(&self, key: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn default_request_handler(&self) -> Option<Arc<dyn RequestHandler>> {
        self.request_handler(&self.config.default_request_handler_key)
    }

    pub(crate) fn next_context_counter(&self) -> u64 {
        self.context_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    // --- sessions ---

    /// Mint, reserve and wake a new session.
    pub fn create_session(&self, _ctx: &Context) -> Result<SessionRef> {
        if self.config.refuses_new_sessions {
            return Err(SessionStoreError::Unavailable("application refuses new sessions".into()).into());
        }
        let counter = self.session_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = generate_session_id(counter);
        self.session_store.ledger().reserve(&id)?.keep();
        let session = SessionRef::new(self.delegate.create_session(id, self));
        session.awake();
        tracing::info!(target: "woframe::app", session = %session.session_id(), "created session");
        Ok(session)
    }

    /// Check out `id` and attach it to `ctx`.
    pub fn restore_session_with_id(
        &self,
        id: &str,
        ctx: &mut Context,
    ) -> Result<SessionRef, SessionStoreError> {
        let session = self.session_store.check_out_session_for_id(id)?;
        session.awake();
        ctx.attach_checked_out_session(session.clone());
        Ok(session)
    }

    /// Try each candidate ID in order; the first restorable one wins.
    pub fn restore_session_from_candidates(
        &self,
        candidates: &[String],
        ctx: &mut Context,
    ) -> Result<SessionRef, SessionStoreError> {
        let mut last_error = None;
        for id in candidates {
            match self.restore_session_with_id(id, ctx) {
                Ok(session) => return Ok(session),
                Err(err) => {
                    tracing::debug!(target: "woframe::app", session = %id, error = %err, "session candidate rejected");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SessionStoreError::NoSuchSession { id: String::new() }))
    }

    // --- pages ---

    /// Instantiate page `name`, preferring the active component's resource
    /// manager, and wake it in `ctx`.
    pub fn page_with_name(&self, name: &str, ctx: &mut Context) -> Result<ComponentRef> {
        let languages = ctx.languages();
        let local_rm = ctx.component().and_then(|c| c.resource_manager());
        let page = local_rm
            .as_ref()
            .and_then(|rm| instantiate_component(rm, name, &languages))
            .or_else(|| instantiate_component(&self.resource_manager, name, &languages))
            .ok_or_else(|| ComponentError::UnknownComponent { name: name.to_owned() })?;
        page.ensure_awake_in_context(ctx);
        Ok(page)
    }

    // --- phases ---

    pub fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        if let Some(session) = ctx.existing_session() {
            return session.take_values_from_request(request, ctx);
        }
        let Some(page) = ctx.page() else {
            return Ok(());
        };
        ctx.enter_component(&page, None)?;
        let outcome = page.take_values_from_request(request, ctx);
        ctx.leave_component(&page)?;
        outcome
    }

    pub fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        if let Some(session) = ctx.existing_session() {
            return session.invoke_action(request, ctx);
        }
        let Some(page) = ctx.page() else {
            return Ok(ActionResult::None);
        };
        ctx.enter_component(&page, None)?;
        let outcome = page.invoke_action(request, ctx);
        ctx.leave_component(&page)?;
        outcome
    }

    pub fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if let Some(session) = ctx.existing_session() {
            return session.append_to_response(response, ctx);
        }
        ctx.element_id_mut().delete_all();
        let Some(page) = ctx.page() else {
            return Ok(());
        };
        ctx.enter_component(&page, None)?;
        let outcome = page.append_to_response(response, ctx);
        ctx.leave_component(&page)?;
        outcome
    }

    /// Turn an action result into a response.
    pub fn render_results(&self, result: ActionResult, ctx: &mut Context) -> Result<Response> {
        match result {
            ActionResult::Page(page) => {
                ctx.set_page(Some(page.clone()));
                let mut response = ctx.take_response().unwrap_or_default();
                ctx.element_id_mut().delete_all();
                ctx.enter_component(&page, None)?;
                let outcome = page.append_to_response(&mut response, ctx);
                ctx.leave_component(&page)?;
                outcome?;
                Ok(response)
            }
            ActionResult::Response(response) => Ok(response),
            ActionResult::Results(results) => Ok(results.generate_response()),
            ActionResult::Redirect(location) => Ok(Response::redirect(&location)),
            ActionResult::Text(text) | ActionResult::Value(Value::Str(text)) => {
                let mut response = ctx.take_response().unwrap_or_default();
                response.append_content_html_string(&text);
                Ok(response)
            }
            ActionResult::None => {
                tracing::warn!(target: "woframe::app", "action produced no result");
                Ok(ctx.take_response().unwrap_or_default())
            }
            ActionResult::Value(other) => {
                tracing::error!(target: "woframe::app", result = ?other, "unexpected action result");
                Ok(Response::with_status(status::INTERNAL_ERROR))
            }
        }
    }

    // --- dispatch ---

    /// Handle one request. Always produces a response, even when a handler
    /// panics.
    pub fn dispatch_request(self: &Arc<Self>, mut request: Request) -> Response {
        request.set_path_prefix(&self.config.url_prefix());
        let request_id = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::info_span!(
            "dispatch",
            request_id,
            method = %request.method(),
            uri = %request.uri()
        );
        let _guard = span.enter();

        let handler = request
            .request_handler_key()
            .and_then(|key| self.request_handler(key))
            .or_else(|| self.default_request_handler());
        let Some(handler) = handler else {
            tracing::error!(target: "woframe::app", "no request handler for request");
            return Response::with_status(status::NOT_FOUND);
        };

        let request = Arc::new(request);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            handle_request(handler.as_ref(), self, Arc::clone(&request))
        }));
        match outcome {
            Ok(response) => {
                tracing::debug!(target: "woframe::app", status = response.status(), "request done");
                response
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                tracing::error!(target: "woframe::app", panic = %message, "request handler panicked");
                let mut response = Response::with_status(status::INTERNAL_ERROR);
                response.append_content_html_string(&format!("fail: {message}"));
                response
            }
        }
    }
}
