//! Token attachment, error classification and the unauthorized wipe.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use nursery_integration_tests::FakeBackend;
use nursery_storefront::models::SessionStatus;
use nursery_storefront::services::LoginCredentials;
use nursery_storefront::storage::MemoryStore;
use nursery_storefront::{ErrorKind, SessionError, Storefront, StorefrontConfig};

const EMAIL: &str = "rosa@garden.example";
const PASSWORD: &str = "greenhouse";

async fn signed_in() -> (FakeBackend, Storefront, Arc<MemoryStore>) {
    let backend = FakeBackend::start().await;
    backend.add_user(EMAIL, PASSWORD, "Rosa", "Gallica");
    let (storefront, store) = backend.storefront();
    storefront
        .sessions()
        .login(&LoginCredentials::new(EMAIL, PASSWORD).unwrap())
        .await
        .unwrap();
    (backend, storefront, store)
}

#[tokio::test]
async fn test_anonymous_requests_carry_no_token() {
    let backend = FakeBackend::start().await;
    let (storefront, _) = backend.storefront();

    let _: Value = storefront
        .pipeline()
        .get_with_query("api/products/search", &[("q", "fern"), ("limit", "2")])
        .await
        .unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let request = requests.first().unwrap();
    assert!(request.authorization.is_none());
    assert_eq!(request.method, "GET");
    assert_eq!(request.query.as_deref(), Some("q=fern&limit=2"));
}

#[tokio::test]
async fn test_signed_in_requests_carry_bearer_token() {
    let (backend, storefront, _) = signed_in().await;

    storefront.sessions().refresh_profile().await.unwrap();

    let requests = backend.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.path, "/api/auth/profile");
    assert_eq!(last.authorization.as_deref(), Some("Bearer tok-1"));
}

#[tokio::test]
async fn test_expired_token_wipes_session_on_any_request() {
    let (backend, storefront, store) = signed_in().await;
    let mut updates = storefront.sessions().subscribe();
    updates.mark_unchanged();
    backend.revoke_tokens();

    // A plain pipeline call, not a session operation.
    let err = storefront
        .pipeline()
        .get::<Value>("api/auth/profile")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.message(), "Invalid or expired token");
    assert_eq!(
        storefront.sessions().current_session().status(),
        SessionStatus::Anonymous
    );
    assert!(store.is_empty());
    assert!(updates.has_changed().unwrap());
    assert!(!updates.borrow_and_update().is_authenticated());
}

#[tokio::test]
async fn test_expired_token_on_suggestion_search_wipes_session() {
    let (backend, storefront, store) = signed_in().await;
    backend.revoke_tokens();

    storefront.suggestions().edit("fern");
    tokio::time::sleep(Duration::from_millis(600)).await;

    let search = backend.requests();
    let search = search.last().unwrap();
    assert_eq!(search.path, "/api/products/search");
    assert_eq!(search.authorization.as_deref(), Some("Bearer tok-1"));

    assert_eq!(
        storefront.sessions().current_session().status(),
        SessionStatus::Anonymous
    );
    assert!(store.is_empty());
    let list = storefront.suggestions().current();
    assert!(list.is_empty());
    assert_eq!(list.error.unwrap().kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_unauthorized_for_previous_session_is_ignored() {
    let (backend, storefront, _) = signed_in().await;
    backend.revoke_tokens();
    backend.delay_profile(Duration::from_millis(300));

    let sessions = storefront.sessions().clone();
    let stale = tokio::spawn(async move { sessions.refresh_profile().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    storefront
        .sessions()
        .login(&LoginCredentials::new(EMAIL, PASSWORD).unwrap())
        .await
        .unwrap();

    let err = stale.await.unwrap().unwrap_err();
    assert_eq!(err.api_error().unwrap().kind(), ErrorKind::Unauthorized);

    let session = storefront.sessions().current_session();
    assert_eq!(session.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_forbidden_keeps_session() {
    let (_backend, storefront, store) = signed_in().await;

    let err = storefront
        .pipeline()
        .get::<Value>("api/admin/orders")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.message(), "Admin access required");
    assert!(storefront.sessions().current_session().is_authenticated());
    assert!(!store.is_empty());
}

#[tokio::test]
async fn test_admin_passes_admin_check() {
    let backend = FakeBackend::start().await;
    backend.add_admin("ada@garden.example", "back-office");
    let (storefront, _) = backend.storefront();
    storefront
        .sessions()
        .login(&LoginCredentials::new("ada@garden.example", "back-office").unwrap())
        .await
        .unwrap();

    assert!(storefront.sessions().current_session().is_admin());
    let orders: Value = storefront.pipeline().get("api/admin/orders").await.unwrap();
    assert_eq!(orders["orders"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn test_not_found_uses_default_message() {
    let (_backend, storefront, _) = signed_in().await;

    let err = storefront
        .pipeline()
        .get::<Value>("api/does-not-exist")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), ErrorKind::NotFound.default_message());
    assert!(storefront.sessions().current_session().is_authenticated());
}

#[tokio::test]
async fn test_non_json_server_error_uses_default_message() {
    let backend = FakeBackend::start().await;
    let (storefront, _) = backend.storefront();

    let err = storefront
        .pipeline()
        .get::<Value>("api/broken")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), ErrorKind::ServerError.default_message());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let config =
        StorefrontConfig::for_base_url(format!("http://127.0.0.1:{port}").parse().unwrap());
    let storefront = Storefront::with_store(config, Arc::new(MemoryStore::new())).unwrap();

    let err = storefront
        .sessions()
        .login(&LoginCredentials::new(EMAIL, PASSWORD).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Api(_)));
    let api = err.api_error().unwrap();
    assert_eq!(api.kind(), ErrorKind::NetworkError);
    assert_eq!(api.message(), ErrorKind::NetworkError.default_message());
    assert_eq!(api.status(), None);
}
