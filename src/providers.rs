use std::sync::Arc;

use research_api::{ApiError, ResearchApiClient};
use research_provider::{SharedStore, SharedTokens, SharedTransport, StaticTokenProvider};
use research_provider_mock::{MemoryConversationStore, ScriptedTransport};

use crate::config::EnvConfig;

/// Token used by the offline provider when none is configured, so local
/// conversations still persist.
pub const MOCK_USER_TOKEN: &str = "mock-user";

/// Collaborators injected into the session controller.
pub struct Backend {
    pub transport: SharedTransport,
    pub store: SharedStore,
    pub tokens: SharedTokens,
    /// Present for the HTTP provider; used for service-level calls.
    pub client: Option<Arc<ResearchApiClient>>,
}

pub fn backend_from_config(config: &EnvConfig) -> Result<Backend, ApiError> {
    if config.is_mock() {
        let token = config
            .api_token
            .clone()
            .or_else(|| Some(MOCK_USER_TOKEN.to_string()));
        return Ok(Backend {
            transport: Arc::new(ScriptedTransport::demo()),
            store: Arc::new(MemoryConversationStore::new()),
            tokens: Arc::new(StaticTokenProvider::new(token)),
            client: None,
        });
    }

    let client = Arc::new(ResearchApiClient::new(config.api_config())?);
    Ok(Backend {
        transport: Arc::clone(&client) as SharedTransport,
        store: Arc::clone(&client) as SharedStore,
        tokens: Arc::new(StaticTokenProvider::new(config.api_token.clone())),
        client: Some(client),
    })
}
