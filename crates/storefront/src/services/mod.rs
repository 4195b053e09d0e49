//! Backend-facing services.
//!
//! # Services
//!
//! - `auth` - Session store: login, registration, logout, profile, bootstrap
//! - `catalog` - Product suggestion search
//! - [`endpoints`] - Backend paths, relative to the configured base URL

pub mod auth;
pub mod catalog;

pub use auth::{
    LoginCredentials, PasswordChange, Registration, SessionError, SessionState, SessionStore,
};
pub use catalog::CatalogClient;

/// Backend paths, relative to the configured base URL.
pub mod endpoints {
    pub const REGISTER: &str = "api/auth/register";
    pub const LOGIN: &str = "api/auth/login";
    pub const PROFILE: &str = "api/auth/profile";
    pub const CHANGE_PASSWORD: &str = "api/auth/change-password";
    pub const LOGOUT: &str = "api/auth/logout";
    pub const VERIFY_TOKEN: &str = "api/auth/verify-token";
    pub const FORGOT_PASSWORD: &str = "api/auth/forgot-password";
    pub const PRODUCT_SEARCH: &str = "api/products/search";
}
