//! Request pipeline for every backend call.
//!
//! The pipeline attaches the current bearer token, decodes JSON responses and
//! classifies failures. A 401 from any endpoint invalidates the session it was
//! sent under, whether or not the caller handles the error.
//!
//! The pipeline knows nothing about the session store beyond the
//! [`SessionHandle`] capability, so ownership stays one-directional.

use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::config::StorefrontConfig;
use crate::error::{ApiError, ErrorBody, Failure, TransportFailure, classify};

/// The credential in force when a request is dispatched.
#[derive(Debug, Clone, Default)]
pub struct SessionTicket {
    /// Session generation the token belongs to.
    pub generation: u64,
    /// Bearer token, absent for anonymous requests.
    pub token: Option<SecretString>,
}

/// What the pipeline needs from whoever owns the session.
pub trait SessionHandle: Send + Sync {
    /// Credential to attach to the next request.
    fn ticket(&self) -> SessionTicket;

    /// The backend rejected a request sent under `generation`; wipe that
    /// session if it is still the current one.
    fn invalidate(&self, generation: u64);
}

/// Uniform dispatch for backend calls.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionHandle>,
}

impl RequestPipeline {
    /// Build a pipeline for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        config: &StorefrontConfig,
        session: Arc<dyn SessionHandle>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(PipelineInner {
                client,
                base_url: config.api_base_url.clone(),
                session,
            }),
        })
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, &[], None).await
    }

    /// `GET` a JSON resource with query parameters.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, query, None).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// `POST` with no request body.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::POST, path, &[], None).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    /// Dispatch a request and decode its JSON response.
    ///
    /// Empty success bodies decode as JSON `null`, so callers that do not
    /// care about the body can ask for `serde::de::IgnoredAny`.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure. A 401 additionally
    /// invalidates the session the request was sent under.
    #[instrument(skip(self, query, body), fields(method = %method, status))]
    pub async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;
        let ticket = self.inner.session.ticket();

        let mut request = self.inner.client.request(method, url);
        if let Some(token) = &ticket.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&ticket, &transport_failure(&e))),
        };

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(&ticket, &transport_failure(&e))),
        };

        if !status.is_success() {
            tracing::debug!(
                body = %text.chars().take(200).collect::<String>(),
                "Backend returned non-success status"
            );
            let failure = Failure::Status {
                status: status.as_u16(),
                body: ErrorBody::parse(&text),
            };
            return Err(self.fail(&ticket, &failure));
        }

        let raw = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(raw).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse backend response");
            self.fail(&ticket, &Failure::Unknown(e.to_string()))
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| classify(&Failure::Unknown(e.to_string())))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Classify a failure, applying the unauthorized side effect.
    fn fail(&self, ticket: &SessionTicket, failure: &Failure) -> ApiError {
        let error = classify(failure);
        if error.is_unauthorized() {
            tracing::warn!(
                generation = ticket.generation,
                "Backend rejected credentials, invalidating session"
            );
            self.inner.session.invalidate(ticket.generation);
        } else {
            tracing::debug!(kind = ?error.kind(), failure = ?failure, "Request failed");
        }
        error
    }
}

fn transport_failure(e: &reqwest::Error) -> Failure {
    if e.is_builder() {
        return Failure::Unknown(e.to_string());
    }
    let kind = if e.is_timeout() {
        TransportFailure::Timeout
    } else if e.is_connect() {
        TransportFailure::Connect
    } else {
        TransportFailure::Other
    };
    Failure::Transport {
        kind,
        detail: e.to_string(),
    }
}
