#![forbid(unsafe_code)]

//! Request processing for woframe.
//!
//! A request flows through an [`Application`] to a [`RequestHandler`],
//! which builds a [`Context`], resolves the session, and drives the page's
//! element tree through the take-values, invoke-action and render phases.
//! Components are stateful template nodes kept alive across requests in
//! their session's page cache.
//!
//! # Concurrency
//!
//! | Shared (`Send + Sync`) | Request-confined |
//! |------------------------|------------------|
//! | `Application`, definitions, templates | `Context` |
//! | `SessionRef`, `ComponentRef` (brief internal locks) | element ID cursor, component stack |
//!
//! A session is held by at most one request at a time; see
//! [`session_store`].

pub mod application;
pub mod component;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod error_report;
pub mod request_handler;
pub mod resource_manager;
pub mod session;
pub mod session_store;

#[cfg(test)]
mod testing;

pub use application::{Application, ApplicationBuilder, ApplicationDelegate, DefaultDelegate};
pub use component::{
    Action, ComponentBehavior, ComponentDefinition, ComponentFault, ComponentRef, DynamicBehavior,
    StatelessBehavior,
};
pub use config::{ApplicationConfig, ConfigError};
pub use context::{Context, QuerySession};
pub use element::{ActionResult, ActionResults, Element, ElementRef, ElementWalker, FnWalker};
pub use error::{ComponentError, Error, Result, SessionStoreError, StackError};
pub use error_report::{ErrorItem, ErrorReport};
pub use request_handler::{
    handle_request, ComponentRequestHandler, DirectActionRequestHandler, RequestHandler,
};
pub use resource_manager::{ComponentRegistry, ResourceManager};
pub use session::{Session, SessionRef};
pub use session_store::{CheckoutLedger, ServerSessionStore, SessionStore};
