//! Product catalog calls used by the storefront core.
//!
//! Only the suggestion search lives here; the rest of the catalog is rendered
//! from backend data by the UI layer.

use serde::Deserialize;
use tracing::instrument;

use super::endpoints;
use crate::error::ApiError;
use crate::models::ProductSummary;
use crate::pipeline::RequestPipeline;
use crate::search::SuggestionSource;

/// Response from the suggestion search.
#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<ProductSummary>,
}

/// Catalog client over the request pipeline.
#[derive(Clone)]
pub struct CatalogClient {
    pipeline: RequestPipeline,
    limit: usize,
}

impl CatalogClient {
    /// Create a client requesting at most `limit` suggestions per query.
    #[must_use]
    pub const fn new(pipeline: RequestPipeline, limit: usize) -> Self {
        Self { pipeline, limit }
    }

    /// Products matching a free-text query, best match first.
    ///
    /// # Errors
    ///
    /// Returns a classified `ApiError` for any failure.
    #[instrument(skip(self), fields(limit = self.limit))]
    pub async fn search(&self, query: &str) -> Result<Vec<ProductSummary>, ApiError> {
        let limit = self.limit.to_string();
        let response: SearchResponse = self
            .pipeline
            .get_with_query(endpoints::PRODUCT_SEARCH, &[("q", query), ("limit", &limit)])
            .await?;
        tracing::debug!(count = response.products.len(), "Suggestions received");
        Ok(response.products)
    }
}

impl SuggestionSource for CatalogClient {
    async fn suggest(&self, query: &str) -> Result<Vec<ProductSummary>, ApiError> {
        self.search(query).await
    }
}
