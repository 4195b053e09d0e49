//! Nursery storefront client core.
//!
//! Session lifecycle, authenticated request dispatch, error classification
//! and search-as-you-type suggestions for the nursery storefront. The UI
//! layer renders from the snapshots published here and never talks to the
//! backend directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod services;
pub mod state;
pub mod storage;

pub use config::StorefrontConfig;
pub use error::{ApiError, ErrorKind};
pub use search::{SearchPhase, SearchSuggester, SuggestionList, SuggestionSource};
pub use services::{SessionError, SessionStore};
pub use state::{ClientBuildError, Storefront};
