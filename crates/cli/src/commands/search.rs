//! Simulated search-as-you-type.

use std::time::Duration;

use tokio::sync::watch;

use nursery_storefront::models::ProductSummary;
use nursery_storefront::{SearchPhase, Storefront, SuggestionList};

use super::CliError;

/// Feed `query` to the suggester one character at a time, then print the
/// list it settles on.
pub async fn type_query(
    storefront: &Storefront,
    query: &str,
    keystroke: Duration,
) -> Result<(), CliError> {
    let suggester = storefront.suggestions();
    let updates = suggester.subscribe();

    let mut typed = String::with_capacity(query.len());
    for ch in query.chars() {
        typed.push(ch);
        if let Some(sequence) = suggester.edit(&typed) {
            tracing::debug!(%sequence, typed = %typed, "Edit");
        }
        tokio::time::sleep(keystroke).await;
    }

    let config = storefront.config();
    let deadline = config.search.quiet_period + config.request_timeout;
    let list = tokio::time::timeout(deadline, settled(updates))
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| suggester.current());

    if let Some(error) = list.error {
        return Err(error.into());
    }
    print_list(&list.query, &list.products);
    Ok(())
}

/// Wait until the list is showing results or idle.
async fn settled(mut updates: watch::Receiver<SuggestionList>) -> Option<SuggestionList> {
    loop {
        let list = updates.borrow_and_update().clone();
        if matches!(list.phase, SearchPhase::Showing | SearchPhase::Idle) {
            return Some(list);
        }
        updates.changed().await.ok()?;
    }
}

#[allow(clippy::print_stdout)]
fn print_list(query: &str, products: &[ProductSummary]) {
    if products.is_empty() {
        println!("No suggestions for \"{query}\"");
        return;
    }
    for product in products {
        if product.on_sale() {
            println!(
                "{:<12} {}  {} (was {}, -{}%)",
                product.id.as_str(),
                product.name,
                product.sale_price(),
                product.price,
                product.discount.get()
            );
        } else {
            println!("{:<12} {}  {}", product.id.as_str(), product.name, product.price);
        }
    }
}
