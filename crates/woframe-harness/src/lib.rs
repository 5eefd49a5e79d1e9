#![forbid(unsafe_code)]

//! Test harness and reference fixtures for woframe applications.
//!
//! # Pieces
//!
//! | Module | Provides |
//! |--------|----------|
//! | [`app`] | [`TestApp`]: an application over an in-memory component registry |
//! | [`client`] | [`Client`]: a cookie-keeping browser stand-in |
//! | [`html`] | attribute extraction and unescaping for rendered markup |
//! | [`logs`] | [`LogCapture`]: structured event capture through `tracing-subscriber` |
//! | [`fixtures`] | ready-made pages used by the end-to-end tests |
//!
//! Everything dispatches through [`woframe_runtime::Application::dispatch_request`],
//! so tests exercise the same pipeline a server adaptor would.

pub mod app;
pub mod client;
pub mod fixtures;
pub mod html;
pub mod logs;

pub use app::{TestApp, TestAppBuilder};
pub use client::Client;
pub use html::{attribute_values, form_actions, hrefs, input_names, unescape_html, ComponentActionUrl};
pub use logs::{CapturedEvent, LogCapture};
