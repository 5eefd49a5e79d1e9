#![forbid(unsafe_code)]

//! Sessions: cross-request state plus the page caches that make
//! component-action URLs resolvable.
//!
//! A [`Session`] is only ever touched by the thread that checked it out of
//! the [`SessionStore`](crate::session_store::SessionStore); the mutex in
//! [`SessionRef`] guards field access, it is not a concurrency protocol.
//!
//! # Page caches
//!
//! Two independent LRU caches map context ID → page. Lookups consult the
//! permanent cache first. Saving a page whose context ID already lives in
//! the permanent cache updates it there, so a page never exists in both.
//! Pages are stored detached from any context.
//!
//! # Invariants
//!
//! 1. The session lock is never held while a page runs.
//! 2. `save_page` is the only way a page enters a cache, and it always
//!    detaches the page tree first.

mod page_cache;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sha2::{Digest, Sha256};
use web_time::{SystemTime, UNIX_EPOCH};
use woframe_core::{Attributes, Cookie, KeyValueCoding, KvcError, Request, Response, Value, SESSION_ID_KEY};

pub use page_cache::PageCache;

use crate::component::ComponentRef;
use crate::config::ApplicationConfig;
use crate::context::Context;
use crate::element::{ActionResult, Element};
use crate::error::Result;

/// Mint a session ID: SHA-256 over time, a process counter and randomness.
pub fn generate_session_id(counter: u64) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let noise = getrandom::u64().unwrap_or_else(|_| secs.rotate_left(17) ^ counter);
    let seed = format!("\t{secs}x{counter}z{noise}\n");
    format!("{:x}", Sha256::digest(seed.as_bytes()))
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

pub struct Session {
    id: String,
    time_out_secs: u64,
    terminating: bool,
    languages: Vec<String>,
    stores_ids_in_cookies: bool,
    stores_ids_in_urls: bool,
    awake: bool,
    extra: Attributes,
    page_cache: PageCache,
    permanent_page_cache: PageCache,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("terminating", &self.terminating)
            .field("page_cache", &self.page_cache)
            .field("permanent_page_cache", &self.permanent_page_cache)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(id: impl Into<String>, config: &ApplicationConfig) -> Self {
        Self {
            id: id.into(),
            time_out_secs: config.session_timeout_secs,
            terminating: false,
            languages: Vec::new(),
            stores_ids_in_cookies: config.stores_ids_in_cookies,
            stores_ids_in_urls: config.stores_ids_in_urls,
            awake: false,
            extra: Attributes::new(),
            page_cache: PageCache::new(config.page_cache_size),
            permanent_page_cache: PageCache::new(config.permanent_page_cache_size),
        }
    }
}

/// The lock around a session's state.
pub struct SessionCell(Mutex<Session>);

fn lock_session(cell: &SessionCell) -> MutexGuard<'_, Session> {
    cell.0.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyValueCoding for SessionCell {
    fn value_for_key(&self, key: &str) -> Value {
        let session = lock_session(self);
        match key {
            "sessionID" | "id" => Value::from(session.id.clone()),
            "timeOut" => Value::from(i64::try_from(session.time_out_secs).unwrap_or(i64::MAX)),
            "languages" => Value::from(session.languages.clone()),
            "isTerminating" => Value::from(session.terminating),
            other => session.extra.value(other),
        }
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> std::result::Result<(), KvcError> {
        let mut session = lock_session(self);
        match key {
            "sessionID" | "id" | "isTerminating" => Err(KvcError::ReadOnly { key: key.to_owned() }),
            "timeOut" => {
                session.time_out_secs = u64::try_from(value.int_value()).unwrap_or_default();
                Ok(())
            }
            "languages" => {
                session.languages = value
                    .to_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::string_value)
                    .collect();
                Ok(())
            }
            other => {
                session.extra.set_object_for_key(value, other);
                Ok(())
            }
        }
    }

    fn description(&self) -> String {
        match self.0.try_lock() {
            Ok(session) => format!("<Session {}>", session.id),
            Err(_) => "<Session (busy)>".to_owned(),
        }
    }

    fn into_any(self: Arc<Self>) -> Option<Arc<dyn std::any::Any + Send + Sync>> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared handle to a session.
#[derive(Clone)]
pub struct SessionRef(Arc<SessionCell>);

impl fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionRef({})", self.0.description())
    }
}

impl SessionRef {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(SessionCell(Mutex::new(session))))
    }

    pub(crate) fn from_arc(inner: Arc<SessionCell>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionCell> {
        Arc::downgrade(&self.0)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        lock_session(&self.0)
    }

    pub fn ptr_eq(&self, other: &SessionRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn session_id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn time_out(&self) -> u64 {
        self.lock().time_out_secs
    }

    pub fn time_out_millis(&self) -> u64 {
        self.time_out().saturating_mul(1000)
    }

    pub fn set_time_out(&self, secs: u64) {
        self.lock().time_out_secs = secs;
    }

    /// Mark for removal; the store drops the session on check-in.
    pub fn terminate(&self) {
        let mut session = self.lock();
        tracing::info!(target: "woframe::session", session = %session.id, "terminate");
        session.terminating = true;
    }

    pub fn is_terminating(&self) -> bool {
        self.lock().terminating
    }

    pub fn languages(&self) -> Vec<String> {
        self.lock().languages.clone()
    }

    pub fn set_languages(&self, languages: Vec<String>) {
        self.lock().languages = languages;
    }

    pub fn stores_ids_in_cookies(&self) -> bool {
        self.lock().stores_ids_in_cookies
    }

    pub fn set_stores_ids_in_cookies(&self, flag: bool) {
        self.lock().stores_ids_in_cookies = flag;
    }

    pub fn stores_ids_in_urls(&self) -> bool {
        self.lock().stores_ids_in_urls
    }

    pub fn set_stores_ids_in_urls(&self, flag: bool) {
        self.lock().stores_ids_in_urls = flag;
    }

    pub fn is_awake(&self) -> bool {
        self.lock().awake
    }

    pub fn awake(&self) {
        let mut session = self.lock();
        session.awake = true;
        tracing::trace!(target: "woframe::session", session = %session.id, "awake");
    }

    pub fn sleep(&self) {
        let mut session = self.lock();
        session.awake = false;
        tracing::trace!(target: "woframe::session", session = %session.id, "sleep");
    }

    // --- page caches ---

    /// Store `page` under `context_id`, in the permanent cache if the ID is
    /// already resident there.
    pub fn save_page(&self, page: &ComponentRef, context_id: &str) {
        page.detach_from_context();
        let mut session = self.lock();
        let evicted = if session.permanent_page_cache.contains(context_id) {
            session.permanent_page_cache.insert(context_id, page.clone())
        } else {
            session.page_cache.insert(context_id, page.clone())
        };
        tracing::debug!(
            target: "woframe::session",
            session = %session.id,
            context = context_id,
            evicted = evicted.as_ref().map(|(k, _)| k.as_str()),
            "saved page"
        );
    }

    pub fn save_page_in_permanent_cache(&self, page: &ComponentRef, context_id: &str) {
        page.detach_from_context();
        let mut session = self.lock();
        session.page_cache.remove(context_id);
        session.permanent_page_cache.insert(context_id, page.clone());
    }

    /// Page saved under `context_id`; permanent cache first.
    pub fn restore_page_for_context_id(&self, context_id: &str) -> Option<ComponentRef> {
        let mut session = self.lock();
        session
            .permanent_page_cache
            .restore(context_id)
            .or_else(|| session.page_cache.restore(context_id))
    }

    /// Context IDs in the regular cache, most recent first.
    pub fn cached_context_ids(&self) -> Vec<String> {
        self.lock().page_cache.keys()
    }

    pub fn permanent_context_ids(&self) -> Vec<String> {
        self.lock().permanent_page_cache.keys()
    }

    // --- cookies ---

    fn cookie_path(ctx: &Context) -> String {
        let prefix = ctx.application().config().url_prefix();
        if prefix.is_empty() { "/".to_owned() } else { prefix }
    }

    pub fn add_session_id_cookie_to_response(&self, response: &mut Response, ctx: &Context) {
        let (id, max_age, terminating) = {
            let session = self.lock();
            (session.id.clone(), session.time_out_secs, session.terminating)
        };
        let cookie = if terminating {
            Cookie::new(SESSION_ID_KEY, "").with_max_age(0)
        } else {
            Cookie::new(SESSION_ID_KEY, id)
                .with_max_age(i64::try_from(max_age).unwrap_or(i64::MAX))
        };
        response.add_cookie(cookie.with_path(Self::cookie_path(ctx)));
    }

    pub fn expire_session_cookie_in_response(&self, response: &mut Response, ctx: &Context) {
        response.add_cookie(
            Cookie::new(SESSION_ID_KEY, "")
                .with_max_age(0)
                .with_path(Self::cookie_path(ctx)),
        );
    }

    // --- request phases ---

    pub fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        if ctx.sender_id().is_some() && request.is_get() && !request.uri().contains('?') {
            tracing::trace!(target: "woframe::session", "GET without query, skipping take values");
            return Ok(());
        }
        let Some(page) = ctx.page() else {
            return Ok(());
        };
        ctx.enter_component(&page, None)?;
        let outcome = page.take_values_from_request(request, ctx);
        ctx.leave_component(&page)?;
        outcome
    }

    /// Run the page's `invoke_action`; no result means "stay on the page".
    pub fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        let Some(page) = ctx.page() else {
            return Ok(ActionResult::None);
        };
        ctx.enter_component(&page, None)?;
        let outcome = page.invoke_action(request, ctx);
        ctx.leave_component(&page)?;
        match outcome? {
            ActionResult::None => Ok(ActionResult::Page(page)),
            other => Ok(other),
        }
    }

    pub fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        if response.is_html() {
            response.disable_client_caching();
        }
        ctx.element_id_mut().delete_all();
        if let Some(page) = ctx.page() {
            ctx.enter_component(&page, None)?;
            let outcome = page.append_to_response(response, ctx);
            ctx.leave_component(&page)?;
            outcome?;
        }
        if self.stores_ids_in_cookies() {
            self.add_session_id_cookie_to_response(response, ctx);
        }
        Ok(())
    }
}

impl KeyValueCoding for SessionRef {
    fn value_for_key(&self, key: &str) -> Value {
        self.0.value_for_key(key)
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> std::result::Result<(), KvcError> {
        self.0.take_value_for_key(value, key)
    }

    fn description(&self) -> String {
        self.0.description()
    }
}
