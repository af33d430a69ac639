use std::sync::Arc;
use detectr_core::{ArtifactStore, ClientIdentifier, Config, Dispatcher, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    identifier: Arc<dyn ClientIdentifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        dispatcher: Arc<Dispatcher>,
        identifier: Arc<dyn ClientIdentifier>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            identifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn identifier(&self) -> &dyn ClientIdentifier {
        self.identifier.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        self.dispatcher.store()
    }
}
