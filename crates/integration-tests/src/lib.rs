//! Integration tests for the nursery storefront core.
//!
//! The tests run the real client stack against [`FakeBackend`], an in-process
//! axum server that speaks the storefront's JSON API. Behavior the tests need
//! to provoke (slow or failing logout, slow or failing searches, revoked
//! tokens) is switched on per test.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nursery-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use nursery_storefront::storage::{KeyValueStore, MemoryStore};
use nursery_storefront::{Storefront, StorefrontConfig};

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

/// Switches for provoking specific backend behavior.
#[derive(Debug, Default)]
struct Behavior {
    logout_fails: bool,
    logout_delay: Duration,
    profile_delay: Duration,
    verify_includes_user: bool,
    search_delays: HashMap<String, Duration>,
    failing_searches: HashSet<String>,
}

struct Account {
    password: String,
    profile: Value,
}

#[derive(Default)]
struct BackendState {
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, String>>,
    next_token: AtomicU64,
    products: Mutex<Vec<Value>>,
    behavior: Mutex<Behavior>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BackendState {
    fn issue_token(&self, email: &str) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{n}");
        lock(&self.tokens).insert(token.clone(), email.to_string());
        token
    }

    fn profile(&self, email: &str) -> Option<Value> {
        lock(&self.accounts).get(email).map(|a| a.profile.clone())
    }

    /// Email of the caller, or the 401 response to send back.
    fn authorize(&self, headers: &HeaderMap) -> Result<String, Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Authentication required"))?;
        lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// In-process storefront backend bound to an ephemeral localhost port.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start a backend seeded with the default catalog and no accounts.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        lock(&state.products).extend(default_catalog());

        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the backend.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("Invalid fake backend URL")
    }

    /// Client configuration pointed at this backend.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::for_base_url(self.url())
    }

    /// A storefront core backed by `store`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn storefront_with(&self, store: Arc<dyn KeyValueStore>) -> Storefront {
        Storefront::with_store(self.config(), store).expect("Failed to build storefront")
    }

    /// A storefront core with fresh in-memory storage, plus that storage.
    #[must_use]
    pub fn storefront(&self) -> (Storefront, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (self.storefront_with(store.clone()), store)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Create a customer account.
    pub fn add_user(&self, email: &str, password: &str, first_name: &str, last_name: &str) {
        self.insert_account(email, password, first_name, last_name, false);
    }

    /// Create an account with back-office access.
    pub fn add_admin(&self, email: &str, password: &str) {
        self.insert_account(email, password, "Ada", "Admin", true);
    }

    fn insert_account(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        is_admin: bool,
    ) {
        let profile = json!({
            "firstName": first_name,
            "lastName": last_name,
            "email": email,
            "address": {},
            "isAdmin": is_admin,
        });
        lock(&self.state.accounts).insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                profile,
            },
        );
    }

    /// Issue a valid token for an existing account without a login request.
    #[must_use]
    pub fn issue_token(&self, email: &str) -> String {
        self.state.issue_token(email)
    }

    /// Expire every issued token.
    pub fn revoke_tokens(&self) {
        lock(&self.state.tokens).clear();
    }

    /// Whether `token` is still accepted.
    #[must_use]
    pub fn token_is_valid(&self, token: &str) -> bool {
        lock(&self.state.tokens).contains_key(token)
    }

    /// Current password of an account.
    #[must_use]
    pub fn password_of(&self, email: &str) -> Option<String> {
        lock(&self.state.accounts)
            .get(email)
            .map(|a| a.password.clone())
    }

    // =========================================================================
    // Behavior switches
    // =========================================================================

    /// Make `POST /api/auth/logout` answer 500.
    pub fn fail_logout(&self) {
        lock(&self.state.behavior).logout_fails = true;
    }

    /// Hold `POST /api/auth/logout` for `delay` before answering.
    pub fn delay_logout(&self, delay: Duration) {
        lock(&self.state.behavior).logout_delay = delay;
    }

    /// Hold `GET /api/auth/profile` for `delay` before answering.
    pub fn delay_profile(&self, delay: Duration) {
        lock(&self.state.behavior).profile_delay = delay;
    }

    /// Include the user in verify-token responses.
    pub fn verify_includes_user(&self) {
        lock(&self.state.behavior).verify_includes_user = true;
    }

    /// Hold searches for exactly `query` for `delay`.
    pub fn delay_search(&self, query: &str, delay: Duration) {
        lock(&self.state.behavior)
            .search_delays
            .insert(query.to_string(), delay);
    }

    /// Make searches for exactly `query` answer 500.
    pub fn fail_search(&self, query: &str) {
        lock(&self.state.behavior)
            .failing_searches
            .insert(query.to_string());
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Number of requests received for `path`.
    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        lock(&self.state.requests)
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Search queries received, in arrival order.
    #[must_use]
    pub fn search_queries(&self) -> Vec<String> {
        lock(&self.state.requests)
            .iter()
            .filter(|r| r.path == "/api/products/search")
            .filter_map(|r| r.query.as_deref())
            .filter_map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .find(|(k, _)| k == "q")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/profile", get(profile).put(update_profile))
        .route("/api/auth/change-password", put(change_password))
        .route("/api/auth/verify-token", get(verify_token))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/products/search", get(search))
        .route("/api/admin/orders", get(admin_orders))
        .route("/api/broken", get(broken))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Arc<BackendState>>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(String::from),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };
    lock(&state.requests).push(recorded);
    next.run(request).await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    phone: Option<String>,
    address: Option<Value>,
}

async fn register(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<RegisterBody>,
) -> Response {
    if body.first_name.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation failed",
                "errors": [{ "field": "firstName", "message": "First name is required" }],
            })),
        )
            .into_response();
    }

    let profile = {
        let mut accounts = lock(&state.accounts);
        if accounts.contains_key(&body.email) {
            return error(StatusCode::CONFLICT, "An account with this email already exists");
        }
        let mut profile = json!({
            "firstName": body.first_name,
            "lastName": body.last_name,
            "email": body.email,
            "address": body.address.unwrap_or_else(|| json!({})),
            "isAdmin": false,
        });
        if let Some(phone) = body.phone {
            profile["phone"] = json!(phone);
        }
        accounts.insert(
            body.email.clone(),
            Account {
                password: body.password,
                profile: profile.clone(),
            },
        );
        profile
    };

    let token = state.issue_token(&body.email);
    (
        StatusCode::CREATED,
        Json(json!({ "token": token, "user": profile })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<LoginBody>) -> Response {
    let profile = {
        let accounts = lock(&state.accounts);
        match accounts.get(&body.email) {
            Some(account) if account.password == body.password => account.profile.clone(),
            _ => return error(StatusCode::UNAUTHORIZED, "Invalid email or password"),
        }
    };
    let token = state.issue_token(&body.email);
    Json(json!({ "token": token, "user": profile })).into_response()
}

async fn logout(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let (fails, delay) = {
        let behavior = lock(&state.behavior);
        (behavior.logout_fails, behavior.logout_delay)
    };
    tokio::time::sleep(delay).await;
    if fails {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Logout unavailable");
    }
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        lock(&state.tokens).remove(token);
    }
    Json(json!({ "message": "Logged out" })).into_response()
}

async fn profile(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let delay = lock(&state.behavior).profile_delay;
    tokio::time::sleep(delay).await;

    let email = match state.authorize(&headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    match state.profile(&email) {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn update_profile(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let email = match state.authorize(&headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    if body.get("firstName").and_then(Value::as_str) == Some("") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Validation failed",
                "errors": [{ "field": "firstName", "message": "First name cannot be empty" }],
            })),
        )
            .into_response();
    }

    let mut accounts = lock(&state.accounts);
    let Some(account) = accounts.get_mut(&email) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    for key in ["firstName", "lastName", "phone"] {
        if let Some(value) = body.get(key) {
            account.profile[key] = value.clone();
        }
    }
    if let Some(Value::Object(address)) = body.get("address") {
        for (key, value) in address {
            account.profile["address"][key] = value.clone();
        }
    }
    Json(json!({ "user": account.profile })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordBody>,
) -> Response {
    let email = match state.authorize(&headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let mut accounts = lock(&state.accounts);
    let Some(account) = accounts.get_mut(&email) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    if account.password != body.current_password {
        return error(StatusCode::BAD_REQUEST, "Current password is incorrect");
    }
    account.password = body.new_password;
    Json(json!({ "message": "Password updated" })).into_response()
}

async fn verify_token(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let email = match state.authorize(&headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    if lock(&state.behavior).verify_includes_user {
        Json(json!({ "valid": true, "user": state.profile(&email) })).into_response()
    } else {
        Json(json!({ "valid": true })).into_response()
    }
}

#[derive(Deserialize)]
struct ForgotPasswordBody {
    email: String,
}

async fn forgot_password(Json(body): Json<ForgotPasswordBody>) -> Response {
    if body.email.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Email is required");
    }
    Json(json!({ "message": "If that email is registered, a reset link has been sent" }))
        .into_response()
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
}

async fn search(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    // Public, but a presented token must still be valid.
    if headers.contains_key(header::AUTHORIZATION) {
        if let Err(response) = state.authorize(&headers) {
            return response;
        }
    }
    let (delay, fails) = {
        let behavior = lock(&state.behavior);
        (
            behavior.search_delays.get(&params.q).copied(),
            behavior.failing_searches.contains(&params.q),
        )
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if fails {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Search is temporarily unavailable");
    }

    let needle = params.q.to_lowercase();
    let products: Vec<Value> = lock(&state.products)
        .iter()
        .filter(|p| {
            p["name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .take(params.limit.unwrap_or(8))
        .cloned()
        .collect();
    Json(json!({ "products": products })).into_response()
}

async fn admin_orders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let email = match state.authorize(&headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let is_admin = state
        .profile(&email)
        .and_then(|p| p["isAdmin"].as_bool())
        .unwrap_or(false);
    if !is_admin {
        return error(StatusCode::FORBIDDEN, "Admin access required");
    }
    Json(json!({ "orders": [] })).into_response()
}

async fn broken() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream exploded").into_response()
}

fn default_catalog() -> Vec<Value> {
    vec![
        json!({ "id": "p-1", "name": "Monstera Deliciosa", "price": 34.99, "discount": 10, "image": "/img/monstera.jpg" }),
        json!({ "id": "p-2", "name": "Monstera Adansonii", "price": 24.5 }),
        json!({ "id": "p-3", "name": "Fiddle Leaf Fig", "price": 45 }),
        json!({ "id": "p-4", "name": "Snake Plant", "price": 19.99, "discount": 0 }),
        json!({ "id": "p-5", "name": "Rose Bush", "price": 15, "discount": 20 }),
        json!({ "id": "p-6", "name": "Rosemary", "price": 6.5 }),
        json!({ "id": "p-7", "name": "Boston Fern", "price": 18 }),
        json!({ "id": "p-8", "name": "Bird's Nest Fern", "price": 21 }),
    ]
}
