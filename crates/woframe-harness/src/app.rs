#![forbid(unsafe_code)]

//! In-process application fixture.

use std::sync::Arc;
use std::time::Duration;

use woframe_core::{Request, Response};
use woframe_runtime::{
    Application, ApplicationConfig, ApplicationDelegate, ComponentDefinition, ComponentRegistry,
    ServerSessionStore,
};

use crate::client::Client;

/// Builder for [`TestApp`].
#[derive(Debug, Default)]
pub struct TestAppBuilder {
    config: ApplicationConfig,
    definitions: Vec<ComponentDefinition>,
    delegate: Option<Arc<dyn ApplicationDelegate>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: ApplicationConfig) -> Self {
        self.config = config;
        self
    }

    /// Adjust the configuration in place.
    #[must_use]
    pub fn configure(mut self, f: impl FnOnce(&mut ApplicationConfig)) -> Self {
        f(&mut self.config);
        self
    }

    #[must_use]
    pub fn component(mut self, definition: ComponentDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    #[must_use]
    pub fn delegate(mut self, delegate: Arc<dyn ApplicationDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn build(self) -> TestApp {
        let registry = Arc::new(ComponentRegistry::new());
        for definition in self.definitions {
            registry.register(definition);
        }
        let store = Arc::new(ServerSessionStore::new(Duration::from_millis(
            self.config.session_checkout_timeout_ms,
        )));
        let mut builder = Application::builder()
            .config(self.config)
            .resource_manager(registry.clone())
            .session_store(store.clone());
        if let Some(delegate) = self.delegate {
            builder = builder.delegate(delegate);
        }
        TestApp {
            application: builder.build(),
            registry,
            store,
        }
    }
}

/// An application wired to an in-memory registry and session store.
#[derive(Debug, Clone)]
pub struct TestApp {
    application: Arc<Application>,
    registry: Arc<ComponentRegistry>,
    store: Arc<ServerSessionStore>,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::new()
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn session_store(&self) -> &Arc<ServerSessionStore> {
        &self.store
    }

    pub fn dispatch(&self, request: Request) -> Response {
        self.application.dispatch_request(request)
    }

    pub fn get(&self, uri: &str) -> Response {
        self.dispatch(Request::get(uri))
    }

    /// POST a urlencoded form.
    pub fn post_form(&self, uri: &str, pairs: &[(&str, &str)]) -> Response {
        self.dispatch(Request::post(uri).with_form_body(pairs.iter().copied()))
    }

    /// A fresh client with an empty cookie jar.
    pub fn client(&self) -> Client<'_> {
        Client::new(self)
    }
}
