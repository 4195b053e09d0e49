//! Storefront core wiring shared across the UI layer.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::pipeline::RequestPipeline;
use crate::search::SearchSuggester;
use crate::services::{CatalogClient, SessionState, SessionStore};
use crate::storage::{FileStore, KeyValueStore, SessionStorage, StorageError};

/// Error assembling the storefront core.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything the UI needs, built once per process.
///
/// This struct is cheaply cloneable via `Arc`. All clones share one session
/// and one suggestion list.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    pipeline: RequestPipeline,
    sessions: SessionStore,
    suggestions: SearchSuggester<CatalogClient>,
}

impl Storefront {
    /// Create the storefront core with the session persisted to
    /// `config.session_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file is unreadable or the HTTP client
    /// cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ClientBuildError> {
        let store = FileStore::open(&config.session_file)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create the storefront core over an arbitrary key-value store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(
        config: StorefrontConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ClientBuildError> {
        let state = Arc::new(SessionState::new(SessionStorage::new(store)));
        let pipeline = RequestPipeline::new(&config, state.clone())?;
        let sessions = SessionStore::new(state, pipeline.clone());
        let catalog = CatalogClient::new(pipeline.clone(), config.search.limit);
        let suggestions = SearchSuggester::new(catalog, config.search.quiet_period);

        tracing::debug!(api = %config.api_base_url, "Storefront core ready");

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                pipeline,
                sessions,
                suggestions,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the request pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Get a reference to the search suggester.
    #[must_use]
    pub fn suggestions(&self) -> &SearchSuggester<CatalogClient> {
        &self.inner.suggestions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::models::SessionStatus;

    #[tokio::test]
    async fn test_new_uses_configured_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            StorefrontConfig::for_base_url(Url::parse("http://127.0.0.1:9/").unwrap());
        config.session_file = dir.path().join("session.json");

        let storefront = Storefront::new(config).unwrap();

        assert_eq!(
            storefront.sessions().current_session().status(),
            SessionStatus::Anonymous
        );
        assert!(storefront.suggestions().current().is_empty());
        assert_eq!(storefront.pipeline().base_url().as_str(), "http://127.0.0.1:9/");
    }

    #[test]
    fn test_corrupt_session_file_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let mut config =
            StorefrontConfig::for_base_url(Url::parse("http://127.0.0.1:9/").unwrap());
        config.session_file = path;

        assert!(matches!(
            Storefront::new(config),
            Err(ClientBuildError::Storage(_))
        ));
    }
}
