//! Debounced, sequence-guarded search suggestions.
//!
//! Every edit is tagged with a [`SequenceNumber`]. An edit restarts the quiet
//! period; only when it elapses without another edit is a request issued.
//! Requests are never cancelled, but a response is applied only while its
//! sequence is the highest one issued since the list was last reset, so a
//! slow response can never overwrite a newer one.

mod debounce;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use nursery_core::ProductId;

use crate::error::ApiError;
use crate::models::ProductSummary;

pub use debounce::SequenceNumber;
use debounce::DebounceTask;

/// Queries shorter than this (in characters, after trimming) clear the list.
pub const MIN_QUERY_CHARS: usize = 2;

/// Anything that can answer a suggestion query.
pub trait SuggestionSource: Send + Sync + 'static {
    /// Products matching `query`, best match first.
    fn suggest(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<ProductSummary>, ApiError>> + Send;
}

/// Where the suggester is in its edit/request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    /// Nothing pending and nothing shown.
    #[default]
    Idle,
    /// Waiting out the quiet period after an edit.
    Debouncing,
    /// A request is in flight for the latest issued query.
    AwaitingResult,
    /// Results for the latest issued query are shown.
    Showing,
}

/// What the dropdown should render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionList {
    /// Current phase.
    pub phase: SearchPhase,
    /// Text of the most recent edit, trimmed.
    pub query: String,
    /// Suggestions on screen. Kept while a newer query is pending.
    pub products: Vec<ProductSummary>,
    /// Sequence of the request `products` came from.
    pub shown: Option<SequenceNumber>,
    /// Failure of the latest issued request, if it failed.
    pub error: Option<ApiError>,
}

impl SuggestionList {
    fn cleared(query: String) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    /// Whether there is anything to render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

struct SuggesterState {
    last_issued: SequenceNumber,
    pending: Option<DebounceTask>,
    /// Sequence whose request is in flight or shown, until any later edit,
    /// close or failure.
    live: Option<SequenceNumber>,
    view: SuggestionList,
}

struct SuggesterInner<S> {
    source: S,
    quiet_period: Duration,
    state: Mutex<SuggesterState>,
    updates: watch::Sender<SuggestionList>,
}

/// Search-as-you-type controller.
///
/// Cheap to clone; clones share the same state.
pub struct SearchSuggester<S> {
    inner: Arc<SuggesterInner<S>>,
}

impl<S> Clone for SearchSuggester<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SuggestionSource> SearchSuggester<S> {
    /// Create an idle suggester.
    #[must_use]
    pub fn new(source: S, quiet_period: Duration) -> Self {
        let (updates, _) = watch::channel(SuggestionList::default());
        Self {
            inner: Arc::new(SuggesterInner {
                source,
                quiet_period,
                state: Mutex::new(SuggesterState {
                    last_issued: SequenceNumber::default(),
                    pending: None,
                    live: None,
                    view: SuggestionList::default(),
                }),
                updates,
            }),
        }
    }

    /// Snapshot of the list as it should be rendered now.
    #[must_use]
    pub fn current(&self) -> SuggestionList {
        self.inner.lock().view.clone()
    }

    /// Receiver that sees every change to the list.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SuggestionList> {
        self.inner.updates.subscribe()
    }

    /// The search box text changed.
    ///
    /// Returns the sequence assigned to the edit, or `None` when the query was
    /// too short and the list was cleared instead.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn edit(&self, text: &str) -> Option<SequenceNumber> {
        let query = text.trim().to_string();
        let mut state = self.inner.lock();
        if let Some(task) = state.pending.take() {
            task.cancel();
        }
        // Whatever is in flight now answers a query the user has moved past.
        state.live = None;

        if query.chars().count() < MIN_QUERY_CHARS {
            state.view = SuggestionList::cleared(query);
            self.inner.publish(&state);
            return None;
        }

        let sequence = state.last_issued.next();
        state.last_issued = sequence;

        let inner = Arc::clone(&self.inner);
        state.pending = Some(DebounceTask::schedule(
            sequence,
            query.clone(),
            self.inner.quiet_period,
            async move { inner.fire(sequence).await },
        ));

        state.view.phase = SearchPhase::Debouncing;
        state.view.query = query;
        self.inner.publish(&state);
        tracing::trace!(%sequence, "Suggestion query scheduled");
        Some(sequence)
    }

    /// The user picked a suggestion. Returns it and closes the list.
    pub fn select(&self, id: &ProductId) -> Option<ProductSummary> {
        let selected = {
            let state = self.inner.lock();
            state.view.products.iter().find(|p| &p.id == id).cloned()
        };
        self.close();
        selected
    }

    /// Dismiss the list and discard anything pending or in flight.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if let Some(task) = state.pending.take() {
            task.cancel();
        }
        state.live = None;
        state.view = SuggestionList::default();
        self.inner.publish(&state);
    }
}

impl<S: SuggestionSource> SuggesterInner<S> {
    fn lock(&self) -> MutexGuard<'_, SuggesterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SuggesterState) {
        self.updates.send_replace(state.view.clone());
    }

    /// The quiet period for `sequence` elapsed.
    async fn fire(&self, sequence: SequenceNumber) {
        let query = {
            let mut state = self.lock();
            // A newer edit may have replaced the task after its timer fired.
            let Some(task) = state
                .pending
                .take_if(|task| task.sequence() == sequence)
            else {
                return;
            };
            state.live = Some(sequence);
            state.view.phase = SearchPhase::AwaitingResult;
            self.publish(&state);
            task.query().to_string()
        };

        tracing::debug!(%sequence, query = %query, "Requesting suggestions");
        let result = self.source.suggest(&query).await;
        self.complete(sequence, result);
    }

    fn complete(&self, sequence: SequenceNumber, result: Result<Vec<ProductSummary>, ApiError>) {
        let mut state = self.lock();
        if state.live != Some(sequence) || state.last_issued != sequence {
            tracing::debug!(%sequence, "Discarding superseded suggestions");
            return;
        }

        match result {
            Ok(products) => {
                state.view.products = products;
                state.view.shown = Some(sequence);
                state.view.error = None;
                state.view.phase = SearchPhase::Showing;
            }
            Err(e) => {
                tracing::debug!(%sequence, error = %e, "Suggestion request failed");
                state.live = None;
                state.view.products.clear();
                state.view.shown = None;
                state.view.error = Some(e);
                state.view.phase = SearchPhase::Idle;
            }
        }
        self.publish(&state);
    }
}
