#![forbid(unsafe_code)]

//! woframe: server-side components with stateful pages and bookmarkable
//! direct actions.
//!
//! This crate re-exports the public surface of the workspace crates:
//!
//! | Crate | Contents |
//! |-------|----------|
//! | [`core`] | values, key-value coding, associations, element IDs, requests and responses |
//! | [`runtime`] | application, contexts, components, sessions, request handlers |
//! | [`elements`] | the dynamic element set used in templates |
//!
//! Most applications only need the [`prelude`].
//!
//! ```ignore
//! use woframe::prelude::*;
//!
//! let hello = ComponentDefinition::new("Main", Arc::new(DynamicString::new(bindings! {
//!     "value" => constant("Hello"),
//! })?))
//! .with_action("default", |_page, _ctx| Ok(ActionResult::None));
//!
//! let registry = Arc::new(ComponentRegistry::new());
//! registry.register(hello);
//! let app = Application::builder().resource_manager(registry).build();
//! let response = app.dispatch_request(Request::get("/wa"));
//! assert_eq!(response.content_string(), "Hello");
//! ```

pub use woframe_core as core;
pub use woframe_elements as elements;
pub use woframe_runtime as runtime;

/// Build a [`runtime::component::Bindings`] map from `name => association`
/// pairs.
#[macro_export]
macro_rules! bindings {
    ($($name:expr => $association:expr),* $(,)?) => {{
        let mut map = $crate::runtime::component::Bindings::new();
        $( map.insert(::std::string::String::from($name), $association); )*
        map
    }};
}

pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::bindings;
    pub use woframe_core::{
        constant, key_path, status, Association, AssociationRef, KeyValueCoding, Record, Request,
        Response, Value, SESSION_ID_KEY,
    };
    pub use woframe_elements::{
        ChildComponentReference, ComponentContent, Compound, Conditional, DynamicString, ElementError,
        Form, Hyperlink, Repetition, SubmitButton, TextField,
    };
    pub use woframe_runtime::component::Bindings;
    pub use woframe_runtime::{
        ActionResult, Application, ApplicationConfig, ApplicationDelegate, ComponentDefinition,
        ComponentRef, ComponentRegistry, Context, Element, ElementRef, Error, Result, ServerSessionStore,
        SessionRef,
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::prelude::*;

    #[test]
    fn prelude_builds_and_serves_a_page() {
        let greeting = DynamicString::new(bindings! {
            "value" => key_path("who"),
            "valueWhenEmpty" => constant("world"),
        })
        .expect("string");
        let main = ComponentDefinition::new("Main", Arc::new(greeting))
            .with_action("default", |_page, _ctx| Ok(ActionResult::None))
            .with_action("greet", |page, ctx| {
                let who = ctx.request().form_value("name").unwrap_or("stranger").to_owned();
                page.take_value_for_key(Value::from(who), "who")?;
                Ok(ActionResult::None)
            });
        let registry = Arc::new(ComponentRegistry::new());
        registry.register(main);
        let app = Application::builder().resource_manager(registry).build();

        assert_eq!(app.dispatch_request(Request::get("/wa")).content_string(), "world");
        assert_eq!(
            app.dispatch_request(Request::get("/wa/greet?name=Ada")).content_string(),
            "Ada"
        );
    }

    #[test]
    fn bindings_macro_accepts_trailing_commas() {
        let map = bindings! { "a" => constant(1), "b" => constant(2), };
        assert_eq!(map.keys().cloned().collect::<Vec<_>>(), vec!["a".to_owned(), "b".to_owned()]);
    }
}
