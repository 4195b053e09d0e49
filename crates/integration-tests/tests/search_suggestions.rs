//! Search-as-you-type against the in-process backend.
//!
//! These run in real time with the default 300ms quiet period, so waits are
//! generous.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use nursery_core::ProductId;
use nursery_integration_tests::FakeBackend;
use nursery_storefront::{ErrorKind, SearchPhase, SuggestionList};

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn names(list: &SuggestionList) -> Vec<&str> {
    list.products.iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn test_typing_burst_sends_one_query() {
    let backend = FakeBackend::start().await;
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    for typed in ["m", "mo", "mon", "mons"] {
        suggester.edit(typed);
        wait(40).await;
    }
    wait(600).await;

    assert_eq!(backend.search_queries(), vec!["mons"]);
    let list = suggester.current();
    assert_eq!(list.phase, SearchPhase::Showing);
    assert_eq!(
        names(&list),
        vec!["Monstera Deliciosa", "Monstera Adansonii"]
    );
}

#[tokio::test]
async fn test_limit_is_sent_with_query() {
    let backend = FakeBackend::start().await;
    let mut config = backend.config();
    config.search.limit = 1;
    let storefront = nursery_storefront::Storefront::with_store(
        config,
        std::sync::Arc::new(nursery_storefront::storage::MemoryStore::new()),
    )
    .unwrap();

    storefront.suggestions().edit("fern");
    wait(600).await;

    assert_eq!(names(&storefront.suggestions().current()), vec!["Boston Fern"]);
    let requests = backend.requests();
    assert_eq!(
        requests.last().unwrap().query.as_deref(),
        Some("q=fern&limit=1")
    );
}

#[tokio::test]
async fn test_slow_older_response_never_replaces_newer() {
    let backend = FakeBackend::start().await;
    backend.delay_search("ros", Duration::from_millis(900));
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    suggester.edit("ros");
    wait(450).await;
    let newest = suggester.edit("rosem").unwrap();
    wait(600).await;

    let list = suggester.current();
    assert_eq!(list.shown, Some(newest));
    assert_eq!(names(&list), vec!["Rosemary"]);

    // Let the slow "ros" response land.
    wait(800).await;
    assert_eq!(backend.search_queries(), vec!["ros", "rosem"]);
    let list = suggester.current();
    assert_eq!(list.shown, Some(newest));
    assert_eq!(names(&list), vec!["Rosemary"]);
    assert_eq!(list.phase, SearchPhase::Showing);
}

#[tokio::test]
async fn test_failed_search_clears_list_and_is_not_retried() {
    let backend = FakeBackend::start().await;
    backend.fail_search("snake p");
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    suggester.edit("snake");
    wait(600).await;
    assert_eq!(names(&suggester.current()), vec!["Snake Plant"]);

    suggester.edit("snake p");
    wait(600).await;

    let list = suggester.current();
    assert!(list.is_empty());
    assert_eq!(list.phase, SearchPhase::Idle);
    assert_eq!(list.error.unwrap().kind(), ErrorKind::ServerError);

    wait(600).await;
    assert_eq!(backend.search_queries(), vec!["snake", "snake p"]);
}

#[tokio::test]
async fn test_short_query_clears_without_request() {
    let backend = FakeBackend::start().await;
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    suggester.edit("fig");
    wait(600).await;
    assert_eq!(names(&suggester.current()), vec!["Fiddle Leaf Fig"]);

    assert!(suggester.edit("f").is_none());
    let list = suggester.current();
    assert!(list.is_empty());
    assert_eq!(list.phase, SearchPhase::Idle);

    wait(600).await;
    assert_eq!(backend.search_queries(), vec!["fig"]);
}

#[tokio::test]
async fn test_close_discards_in_flight_response() {
    let backend = FakeBackend::start().await;
    backend.delay_search("monstera", Duration::from_millis(400));
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    suggester.edit("monstera");
    wait(450).await;
    assert_eq!(suggester.current().phase, SearchPhase::AwaitingResult);
    suggester.close();
    wait(600).await;

    assert_eq!(suggester.current(), SuggestionList::default());
    assert_eq!(backend.search_queries(), vec!["monstera"]);
}

#[tokio::test]
async fn test_select_returns_product_and_closes() {
    let backend = FakeBackend::start().await;
    let (storefront, _) = backend.storefront();
    let suggester = storefront.suggestions();

    suggester.edit("monstera d");
    wait(600).await;

    let picked = suggester.select(&ProductId::new("p-1")).unwrap();
    assert_eq!(picked.name, "Monstera Deliciosa");
    assert!(picked.on_sale());
    assert_eq!(picked.sale_price().to_string(), "$31.49");
    assert_eq!(picked.image.as_deref(), Some("/img/monstera.jpg"));

    let list = suggester.current();
    assert!(list.is_empty());
    assert_eq!(list.phase, SearchPhase::Idle);
}
