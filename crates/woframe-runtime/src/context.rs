#![forbid(unsafe_code)]

//! The per-transaction context.
//!
//! One [`Context`] is created for every request and dropped when the
//! response has been produced. It owns the component stack, the element ID
//! cursor, the session reference, and everything derived from the request
//! (languages, locale, time zone, query session). Contexts are confined to
//! the thread handling their request.
//!
//! # Invariants
//!
//! 1. Every successful `enter_component` is paired with a
//!    `leave_component` for the same component; the stack depth after a
//!    balanced pair equals the depth before it.
//! 2. `enter_component` pulls bindings from the parent for every frame
//!    but the root. `leave_component` pushes bindings back only when the
//!    component sits at least two levels below the root frame.
//! 3. Every component woken during the transaction is recorded once and
//!    is slept exactly once by [`Context::sleep_components`].
//! 4. Generating a component action URL sets the save-page flag; the
//!    pipeline then caches the page under this context's ID.
//!
//! # Failure Modes
//!
//! | Operation | Failure | Result |
//! |-----------|---------|--------|
//! | `enter_component` | depth limit reached | logged, not pushed, `StackError::Overflow` |
//! | `leave_component` | empty stack | logged, `StackError::Underflow` |
//! | `leave_component` | other component on top | logged, stack untouched, `StackError::LeaveMismatch` |
//! | `add_active_form_element` | second registration | logged, ignored |
//! | `pop_error_report` | no active report | logged, `None` |

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use web_time::{SystemTime, UNIX_EPOCH};
use woframe_core::locale::normalize_locale;
use woframe_core::message::encode_query;
use woframe_core::{Attributes, ElementId, KeyValueCoding, KvcError, Request, Response, Value, SESSION_ID_KEY};

use crate::application::Application;
use crate::component::ComponentRef;
use crate::element::ElementRef;
use crate::error::{Result, StackError};
use crate::error_report::ErrorReport;
use crate::session::SessionRef;

/// Seconds subtracted from the wall clock when minting context IDs.
const CONTEXT_ID_EPOCH: u64 = 1_157_999_293;

/// Mint a context ID from the clock and a per-application counter.
pub fn generate_context_id(counter: u64) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}x{counter}", secs.saturating_sub(CONTEXT_ID_EPOCH))
}

// ---------------------------------------------------------------------------
// Query session
// ---------------------------------------------------------------------------

/// Request values that are carried over into generated direct action URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySession {
    active_keys: Vec<String>,
    values: BTreeMap<String, String>,
}

impl QuerySession {
    /// Pick up the values of `active_keys` from `request`.
    pub fn from_request(request: &Request, active_keys: &[String]) -> Self {
        let values = active_keys
            .iter()
            .filter_map(|key| {
                request
                    .form_value(key)
                    .filter(|v| !v.is_empty())
                    .map(|v| (key.clone(), v.to_owned()))
            })
            .collect();
        Self {
            active_keys: active_keys.to_vec(),
            values,
        }
    }

    pub fn active_keys(&self) -> &[String] {
        &self.active_keys
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `None` removes the key.
    pub fn set_value(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                if !self.active_keys.iter().any(|k| k == key) {
                    self.active_keys.push(key.to_owned());
                }
                self.values.insert(key.to_owned(), v.to_owned());
            }
            None => {
                self.values.remove(key);
            }
        }
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Frame {
    component: ComponentRef,
    content: Option<ElementRef>,
}

pub struct Context {
    id: String,
    application: Arc<Application>,
    request: Arc<Request>,
    response: Option<Response>,
    session: Option<SessionRef>,
    session_reserved: bool,
    has_new_session: bool,
    page: Option<ComponentRef>,
    stack: Vec<Frame>,
    max_depth: usize,
    element_id: ElementId,
    sender_id: Option<String>,
    active_form_element: Option<String>,
    in_form: bool,
    rendering_disabled: bool,
    save_page_required: bool,
    awake_components: Vec<ComponentRef>,
    error_reports: Vec<ErrorReport>,
    languages: OnceCell<Vec<String>>,
    locale: OnceCell<String>,
    timezone: OnceCell<String>,
    query_session: Option<QuerySession>,
    extra: RefCell<Attributes>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("uri", &self.request.uri())
            .field("stack_depth", &self.stack.len())
            .field("element_id", &self.element_id.as_str())
            .field("sender_id", &self.sender_id)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(application: Arc<Application>, request: Arc<Request>) -> Self {
        let id = generate_context_id(application.next_context_counter());
        let max_depth = application.config().max_component_stack_depth;
        tracing::trace!(target: "woframe::context", context = %id, uri = request.uri(), "new context");
        Self {
            id,
            application,
            request,
            response: None,
            session: None,
            session_reserved: false,
            has_new_session: false,
            page: None,
            stack: Vec::with_capacity(max_depth.min(32)),
            max_depth,
            element_id: ElementId::new(),
            sender_id: None,
            active_form_element: None,
            in_form: false,
            rendering_disabled: false,
            save_page_required: false,
            awake_components: Vec::new(),
            error_reports: Vec::new(),
            languages: OnceCell::new(),
            locale: OnceCell::new(),
            timezone: OnceCell::new(),
            query_session: None,
            extra: RefCell::new(Attributes::new()),
        }
    }

    #[inline]
    pub fn context_id(&self) -> &str {
        &self.id
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Shared handle to the request, for calls that also need `&mut self`.
    pub fn request_arc(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    // --- session ---

    /// The session, created through the application if there is none yet.
    pub fn session(&mut self) -> Result<SessionRef> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let application = Arc::clone(&self.application);
        let session = application.create_session(self)?;
        self.session = Some(session.clone());
        self.session_reserved = true;
        self.has_new_session = true;
        if let Some(page) = self.page.clone() {
            // the page was woken before the session existed
            page.set_session_if_awake(&session);
        }
        Ok(session)
    }

    pub fn existing_session(&self) -> Option<SessionRef> {
        self.session.clone()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_new_session(&self) -> bool {
        self.has_new_session
    }

    /// Attach a session whose ID this request holds in the store ledger.
    pub(crate) fn attach_checked_out_session(&mut self, session: SessionRef) {
        self.session = Some(session);
        self.session_reserved = true;
    }

    pub(crate) fn mark_session_checked_in(&mut self) {
        self.session_reserved = false;
    }

    // --- page ---

    pub fn page(&self) -> Option<ComponentRef> {
        self.page.clone()
    }

    /// Make `page` the response page and wake it in this context.
    pub fn set_page(&mut self, page: Option<ComponentRef>) {
        if let Some(page) = &page {
            page.ensure_awake_in_context(self);
        }
        self.page = page;
    }

    pub fn page_with_name(&mut self, name: &str) -> Result<ComponentRef> {
        let application = Arc::clone(&self.application);
        application.page_with_name(name, self)
    }

    // --- component stack ---

    pub fn enter_component(
        &mut self,
        component: &ComponentRef,
        content: Option<ElementRef>,
    ) -> Result<(), StackError> {
        let depth = self.stack.len();
        if depth >= self.max_depth {
            tracing::error!(
                target: "woframe::context",
                context = %self.id,
                component = %component.name(),
                depth = depth + 1,
                max = self.max_depth,
                "component stack depth exhausted"
            );
            return Err(StackError::Overflow {
                depth: depth + 1,
                max: self.max_depth,
            });
        }

        self.stack.push(Frame {
            component: component.clone(),
            content,
        });
        component.ensure_awake_in_context(self);
        if depth > 0 {
            component.pull_values_from_parent(self);
        }
        Ok(())
    }

    pub fn leave_component(&mut self, component: &ComponentRef) -> Result<(), StackError> {
        let Some(top) = self.stack.last() else {
            tracing::error!(
                target: "woframe::context",
                context = %self.id,
                component = %component.name(),
                "empty stack, tried to leave component"
            );
            return Err(StackError::Underflow);
        };
        if !top.component.ptr_eq(component) {
            let found = top.component.name();
            tracing::error!(
                target: "woframe::context",
                context = %self.id,
                expected = %component.name(),
                found = %found,
                "component leave mismatch"
            );
            return Err(StackError::LeaveMismatch {
                expected: component.name(),
                found,
            });
        }

        if self.stack.len() > 2 {
            component.push_values_to_parent(self);
        }
        self.stack.pop();
        Ok(())
    }

    /// The active component: top of the stack, else the page.
    pub fn component(&self) -> Option<ComponentRef> {
        self.stack
            .last()
            .map(|f| f.component.clone())
            .or_else(|| self.page.clone())
    }

    /// The component below the active one.
    pub fn parent_component(&self) -> Option<ComponentRef> {
        let len = self.stack.len();
        (len >= 2).then(|| self.stack[len - 2].component.clone())
    }

    /// Content the active component's caller passed in.
    pub fn component_content(&self) -> Option<ElementRef> {
        self.stack.last().and_then(|f| f.content.clone())
    }

    pub fn component_stack_count(&self) -> usize {
        self.stack.len()
    }

    /// The object bindings evaluate against.
    pub fn cursor(&self) -> Option<ComponentRef> {
        self.component()
    }

    // --- awake bookkeeping ---

    pub fn add_awake_component(&mut self, component: &ComponentRef) {
        if !self.awake_components.iter().any(|c| c.ptr_eq(component)) {
            self.awake_components.push(component.clone());
        }
    }

    pub fn awake_component_count(&self) -> usize {
        self.awake_components.len()
    }

    /// Sleep every component woken in this transaction, the page included.
    pub fn sleep_components(&mut self) {
        let mut components = std::mem::take(&mut self.awake_components);
        if let Some(page) = &self.page {
            if !components.iter().any(|c| c.ptr_eq(page)) {
                components.push(page.clone());
            }
        }
        tracing::trace!(target: "woframe::context", context = %self.id, count = components.len(), "sleep components");
        for component in &components {
            component.sleep_with_context(self);
        }
    }

    // --- element IDs ---

    pub fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    pub fn element_id_mut(&mut self) -> &mut ElementId {
        &mut self.element_id
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.sender_id.as_deref()
    }

    pub fn set_sender_id(&mut self, sender_id: Option<String>) {
        self.sender_id = sender_id;
    }

    /// Whether the cursor is exactly at the request's sender element.
    pub fn is_sender(&self) -> bool {
        self.sender_id.as_deref() == Some(self.element_id.as_str())
    }

    /// Whether the sender element lies inside the current subtree.
    pub fn is_sender_in_subtree(&self) -> bool {
        self.sender_id
            .as_deref()
            .is_some_and(|sender| self.element_id.is_prefix_of(sender))
    }

    // --- forms ---

    /// Register the form element at the cursor as the one that triggered
    /// the submit; it also becomes the sender.
    pub fn add_active_form_element(&mut self) -> bool {
        if let Some(active) = &self.active_form_element {
            tracing::error!(
                target: "woframe::forms",
                active = %active,
                element_id = %self.element_id,
                "active form element already set"
            );
            return false;
        }
        let id = self.element_id.as_str().to_owned();
        self.active_form_element = Some(id.clone());
        self.sender_id = Some(id);
        true
    }

    pub fn active_form_element(&self) -> Option<&str> {
        self.active_form_element.as_deref()
    }

    pub fn set_in_form(&mut self, flag: bool) {
        if self.in_form && flag {
            tracing::warn!(target: "woframe::forms", element_id = %self.element_id, "form is already active");
        }
        self.in_form = flag;
    }

    pub fn is_in_form(&self) -> bool {
        self.in_form
    }

    // --- flags ---

    pub fn disable_rendering(&mut self) {
        self.rendering_disabled = true;
    }

    pub fn enable_rendering(&mut self) {
        self.rendering_disabled = false;
    }

    pub fn is_rendering_disabled(&self) -> bool {
        self.rendering_disabled
    }

    pub fn set_save_page_required(&mut self, flag: bool) {
        self.save_page_required = flag;
    }

    pub fn is_save_page_required(&self) -> bool {
        self.save_page_required
    }

    // --- error reports ---

    pub fn push_error_report(&mut self, report: ErrorReport) {
        self.error_reports.push(report);
    }

    pub fn pop_error_report(&mut self) -> Option<ErrorReport> {
        let report = self.error_reports.pop();
        if report.is_none() {
            tracing::warn!(target: "woframe::context", context = %self.id, "pop_error_report without an active report");
        }
        report
    }

    pub fn error_report(&self) -> Option<&ErrorReport> {
        self.error_reports.last()
    }

    pub fn error_report_mut(&mut self) -> Option<&mut ErrorReport> {
        self.error_reports.last_mut()
    }

    pub fn has_error_report(&self) -> bool {
        !self.error_reports.is_empty()
    }

    // --- languages ---

    /// Preferred languages: explicit, then session, then `Accept-Language`,
    /// then the configured default.
    pub fn languages(&self) -> Vec<String> {
        self.languages
            .get_or_init(|| {
                if let Some(session) = &self.session {
                    let langs = session.languages();
                    if !langs.is_empty() {
                        return langs;
                    }
                }
                let accepted = self.request.accept_languages();
                if !accepted.is_empty() {
                    return accepted;
                }
                vec![self.application.config().default_language.clone()]
            })
            .clone()
    }

    pub fn set_languages(&mut self, languages: Vec<String>) {
        self.languages = OnceCell::from(languages);
        self.locale = OnceCell::new();
    }

    /// `LC` form value, then the session's `locale`, then the first language.
    pub fn locale(&self) -> String {
        self.locale
            .get_or_init(|| {
                let explicit = self
                    .request
                    .form_value("LC")
                    .map(str::to_owned)
                    .or_else(|| {
                        self.session
                            .as_ref()
                            .and_then(|s| s.value_for_key("locale").string_value())
                    });
                explicit
                    .into_iter()
                    .chain(self.languages())
                    .find_map(|raw| normalize_locale(&raw))
                    .unwrap_or_else(|| self.application.config().default_language.clone())
            })
            .clone()
    }

    /// `TZ` form value, then the session's `timezone`, then the default.
    pub fn timezone(&self) -> String {
        self.timezone
            .get_or_init(|| {
                self.request
                    .form_value("TZ")
                    .filter(|tz| !tz.is_empty())
                    .map(str::to_owned)
                    .or_else(|| {
                        self.session
                            .as_ref()
                            .and_then(|s| s.value_for_key("timezone").string_value())
                    })
                    .unwrap_or_else(|| self.application.config().default_timezone.clone())
            })
            .clone()
    }

    // --- query session ---

    pub fn query_session(&mut self) -> &mut QuerySession {
        let request = &self.request;
        let keys = self.application.query_session_keys();
        self.query_session
            .get_or_insert_with(|| QuerySession::from_request(request, keys))
    }

    // --- URLs ---

    /// `{prefix}/{key}/{path}[?query]`.
    pub fn url_with_request_handler_key(&self, key: &str, path: &str, query: Option<&str>) -> String {
        let mut url = self.application.config().url_prefix();
        url.push('/');
        url.push_str(key);
        let path = path.trim_start_matches('/');
        if !path.is_empty() {
            url.push('/');
            url.push_str(path);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// URL addressing the element at the cursor on this rendering of the
    /// page. Creates the session if needed and marks the page for saving.
    pub fn component_action_url(&mut self) -> Result<String> {
        let session_id = self.session()?.session_id();
        self.save_page_required = true;
        let key = self.application.config().component_request_handler_key.clone();
        let path = format!("{session_id}/{}/{}", self.id, self.element_id);
        Ok(self.url_with_request_handler_key(&key, &path, None))
    }

    /// URL for a direct action. The session ID is only added when asked for
    /// and a session already exists.
    pub fn direct_action_url_for_action_named(
        &mut self,
        name: &str,
        query: &BTreeMap<String, String>,
        add_session_id: bool,
        include_query_session: bool,
    ) -> String {
        let mut pairs: BTreeMap<String, String> = BTreeMap::new();
        if include_query_session {
            pairs.extend(
                self.query_session()
                    .values()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        pairs.extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
        if add_session_id {
            if let Some(session) = &self.session {
                pairs.insert(SESSION_ID_KEY.to_owned(), session.session_id());
            }
        }
        let query_string = encode_query(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let key = self.application.config().direct_action_request_handler_key.clone();
        self.url_with_request_handler_key(&key, name, Some(&query_string))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.session_reserved {
            return;
        }
        if let Some(session) = &self.session {
            let id = session.session_id();
            tracing::warn!(
                target: "woframe::context",
                context = %self.id,
                session = %id,
                "context dropped with session still checked out, releasing"
            );
            self.application.session_store().release_session_id(&id);
        }
    }
}

impl KeyValueCoding for Context {
    fn value_for_key(&self, key: &str) -> Value {
        match key {
            "contextID" => Value::from(self.id.clone()),
            "elementID" => Value::from(self.element_id.as_str()),
            "senderID" => Value::from(self.sender_id.clone()),
            "page" => self.page.as_ref().map_or(Value::Null, ComponentRef::to_value),
            "component" => self.component().map_or(Value::Null, |c| c.to_value()),
            "session" => self.session.as_ref().map_or(Value::Null, SessionRef::to_value),
            "hasSession" => Value::from(self.session.is_some()),
            "languages" => Value::from(self.languages()),
            "locale" => Value::from(self.locale()),
            "timezone" => Value::from(self.timezone()),
            "isInForm" => Value::from(self.in_form),
            other => self.extra.borrow().value(other),
        }
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> Result<(), KvcError> {
        match key {
            "contextID" | "elementID" | "senderID" | "page" | "component" | "session" => {
                Err(KvcError::ReadOnly { key: key.to_owned() })
            }
            other => {
                self.extra.borrow_mut().set_object_for_key(value, other);
                Ok(())
            }
        }
    }

    fn description(&self) -> String {
        format!("<Context {}>", self.id)
    }
}
