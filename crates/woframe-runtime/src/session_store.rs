#![forbid(unsafe_code)]

//! Session storage with exclusive checkout.
//!
//! At most one request holds a given session at a time. A requester
//! reserves the ID in the [`CheckoutLedger`]; if another request already
//! holds it, the requester polls with growing sleeps until the holder
//! checks the session back in or the checkout timeout expires.
//!
//! # Backoff
//!
//! | Attempt | Sleep |
//! |---------|-------|
//! | 0–4 | 20 ms |
//! | 5–9 | 50 ms |
//! | 10–19 | 100 ms |
//! | 20+ | 500 ms |
//!
//! # Failure Modes
//!
//! | Situation | Result |
//! |-----------|--------|
//! | reservation not obtained in time | `SessionStoreError::CheckoutTimeout` |
//! | reserved but nothing stored under the ID | reservation released, `NoSuchSession` |
//! | save fails on check-in | reservation still released, error returned |

use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use web_time::Instant;

use crate::context::Context;
use crate::error::SessionStoreError;
use crate::session::SessionRef;

/// Sleep before checkout attempt `attempt` (0-based) is retried.
pub fn checkout_backoff(attempt: u32) -> Duration {
    let millis = match attempt {
        0..=4 => 20,
        5..=9 => 50,
        10..=19 => 100,
        _ => 500,
    };
    Duration::from_millis(millis)
}

/// The set of currently checked-out session IDs.
#[derive(Debug)]
pub struct CheckoutLedger {
    checked_out: Mutex<AHashSet<String>>,
    released: Condvar,
    timeout: Duration,
}

impl CheckoutLedger {
    pub fn new(timeout: Duration) -> Self {
        Self {
            checked_out: Mutex::new(AHashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add `id` if absent. Returns whether this call reserved it.
    fn try_reserve(&self, id: &str) -> bool {
        let mut set = self.checked_out.lock().unwrap_or_else(PoisonError::into_inner);
        if set.contains(id) {
            false
        } else {
            set.insert(id.to_owned());
            true
        }
    }

    /// Reserve `id`, waiting up to the ledger timeout.
    pub fn reserve(&self, id: &str) -> Result<Reservation<'_>, SessionStoreError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            if self.try_reserve(id) {
                if attempt > 0 {
                    tracing::debug!(
                        target: "woframe::store",
                        session = id,
                        attempts = attempt + 1,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "checkout after contention"
                    );
                }
                return Ok(Reservation {
                    ledger: self,
                    id: id.to_owned(),
                    kept: false,
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                let waited_ms = elapsed.as_millis() as u64;
                tracing::warn!(target: "woframe::store", session = id, waited_ms, "session checkout timed out");
                return Err(SessionStoreError::CheckoutTimeout {
                    id: id.to_owned(),
                    waited_ms,
                });
            }

            let pause = checkout_backoff(attempt).min(self.timeout - elapsed);
            let set = self.checked_out.lock().unwrap_or_else(PoisonError::into_inner);
            if set.contains(id) {
                // woken early on any release; the loop re-checks
                let _ = self
                    .released
                    .wait_timeout(set, pause)
                    .unwrap_or_else(PoisonError::into_inner);
            } else {
                drop(set);
                thread::yield_now();
            }
            attempt += 1;
        }
    }

    /// Drop `id` from the set. Returns whether it was reserved.
    pub fn release(&self, id: &str) -> bool {
        let removed = self
            .checked_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed {
            self.released.notify_all();
        } else {
            tracing::warn!(target: "woframe::store", session = id, "release of a session that is not checked out");
        }
        removed
    }

    pub fn is_checked_out(&self, id: &str) -> bool {
        self.checked_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn checked_out_count(&self) -> usize {
        self.checked_out.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A held reservation. Released on drop unless [`Reservation::keep`] was
/// called, in which case the caller owes a [`CheckoutLedger::release`].
#[derive(Debug)]
pub struct Reservation<'a> {
    ledger: &'a CheckoutLedger,
    id: String,
    kept: bool,
}

impl Reservation<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.ledger.release(&self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Persistence for sessions between requests.
///
/// Implementors provide the raw restore/save/remove operations; checkout
/// and check-in are provided on top of them.
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    fn ledger(&self) -> &CheckoutLedger;

    fn restore_session_for_id(&self, id: &str) -> Option<SessionRef>;

    fn save_session_for_context(&self, session: &SessionRef, ctx: &Context) -> Result<(), SessionStoreError>;

    fn remove_session_for_id(&self, id: &str);

    /// Reserve and restore `id`. On success the caller owns the reservation
    /// and must pass the session to [`SessionStore::check_in_session`].
    fn check_out_session_for_id(&self, id: &str) -> Result<SessionRef, SessionStoreError> {
        let reservation = self.ledger().reserve(id)?;
        match self.restore_session_for_id(id) {
            Some(session) => {
                reservation.keep();
                tracing::debug!(target: "woframe::store", session = id, "checked out");
                Ok(session)
            }
            None => {
                tracing::debug!(target: "woframe::store", session = id, "no session stored under id");
                Err(SessionStoreError::NoSuchSession { id: id.to_owned() })
            }
        }
    }

    /// Persist (or drop, if terminating) and release the reservation. The
    /// reservation is released even when saving fails.
    fn check_in_session(&self, session: &SessionRef, ctx: &Context) -> Result<(), SessionStoreError> {
        let id = session.session_id();
        let outcome = if session.is_terminating() {
            self.remove_session_for_id(&id);
            Ok(())
        } else {
            self.save_session_for_context(session, ctx)
        };
        self.ledger().release(&id);
        tracing::debug!(target: "woframe::store", session = %id, ok = outcome.is_ok(), "checked in");
        outcome
    }

    /// Release a reservation for a session that is not being saved (e.g.
    /// one created during a request whose save was skipped).
    fn release_session_id(&self, id: &str) {
        self.ledger().release(id);
    }
}

/// In-memory store.
#[derive(Debug)]
pub struct ServerSessionStore {
    ledger: CheckoutLedger,
    sessions: Mutex<AHashMap<String, SessionRef>>,
}

impl ServerSessionStore {
    pub fn new(checkout_timeout: Duration) -> Self {
        Self {
            ledger: CheckoutLedger::new(checkout_timeout),
            sessions: Mutex::new(AHashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Insert directly, without checkout. Used when seeding a store.
    pub fn insert(&self, session: SessionRef) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.session_id(), session);
    }
}

impl SessionStore for ServerSessionStore {
    fn ledger(&self) -> &CheckoutLedger {
        &self.ledger
    }

    fn restore_session_for_id(&self, id: &str) -> Option<SessionRef> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn save_session_for_context(&self, session: &SessionRef, _ctx: &Context) -> Result<(), SessionStoreError> {
        self.insert(session.clone());
        Ok(())
    }

    fn remove_session_for_id(&self, id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}
