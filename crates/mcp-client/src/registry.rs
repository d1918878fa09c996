//! `Registry`: owns the single shared [`ClientHandle`] of an application.
//!
//! The registry is an ordinary value: create it at the composition root and
//! pass it (or an `Arc` of it) to whatever needs the graph server. At most
//! one handle exists at a time; it is built lazily by [`Registry::get`] and
//! discarded by [`Registry::reset`].

use std::sync::Arc;

use parking_lot::Mutex;

use gl_domain::config::GraphMcpConfig;

use crate::error::McpError;
use crate::handle::{ClientHandle, ErrorSink};
use crate::session::{SessionFactory, SseSessionFactory};

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct Registry {
    config: GraphMcpConfig,
    factory: Arc<dyn SessionFactory>,
    env: EnvLookup,
    on_disconnect_error: Option<ErrorSink>,
    slot: Mutex<Option<Arc<ClientHandle>>>,
}

impl Registry {
    /// A registry that connects over HTTP+SSE using `config`.
    pub fn new(config: GraphMcpConfig) -> Self {
        let factory = Arc::new(SseSessionFactory::from_config(&config));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: GraphMcpConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            config,
            factory,
            env: Arc::new(process_env),
            on_disconnect_error: None,
            slot: Mutex::new(None),
        }
    }

    /// Replace the environment lookup used for the base URL and API key.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Install an error sink on every handle this registry creates.
    pub fn on_disconnect_error(mut self, sink: ErrorSink) -> Self {
        self.on_disconnect_error = Some(sink);
        self
    }

    pub fn config(&self) -> &GraphMcpConfig {
        &self.config
    }

    /// Return the shared handle, creating it on first use.
    ///
    /// An existing handle is returned as-is (the override is ignored and no
    /// reconnect happens). Otherwise the API key is taken from
    /// `api_key_override`, the config, or `NEO4J_MCP_API_KEY`, in that order.
    pub fn get(&self, api_key_override: Option<&str>) -> Result<Arc<ClientHandle>, McpError> {
        let mut slot = self.slot.lock();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let env = &*self.env;
        let api_key = self
            .config
            .resolve_api_key_with(api_key_override, env)
            .ok_or_else(|| {
                McpError::Configuration(format!(
                    "no MCP API key; set {} or pass one explicitly",
                    self.config.api_key_env
                ))
            })?;

        let base_url = self.config.resolve_base_url_with(env);
        let mut handle = ClientHandle::with_factory(api_key, base_url, self.factory.clone())?;
        if let Some(sink) = &self.on_disconnect_error {
            handle = handle.on_disconnect_error(sink.clone());
        }

        tracing::debug!(server_url = %handle.redacted_url(), "created MCP client handle");

        let handle = Arc::new(handle);
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// The current handle, without creating one.
    pub fn current(&self) -> Option<Arc<ClientHandle>> {
        self.slot.lock().clone()
    }

    /// Drop the shared handle, disconnecting it in the background.
    ///
    /// The disconnect is fire-and-forget on the ambient tokio runtime; with
    /// no runtime it is skipped and the session is closed when dropped.
    pub fn reset(&self) {
        let Some(handle) = self.slot.lock().take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    handle.disconnect().await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    server_url = %handle.redacted_url(),
                    "no tokio runtime available, skipping MCP disconnect on reset"
                );
            }
        }
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
