//! Product summaries returned by the suggestion search.

use serde::{Deserialize, Serialize};

use nursery_core::{DiscountPercent, Price, ProductId};

/// A compact product card shown in the suggestion dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    /// Backend product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// List price before discount.
    pub price: Price,
    /// Active discount, zero when the product is not on sale.
    #[serde(default)]
    pub discount: DiscountPercent,
    /// Image URL or asset path, as sent by the backend.
    #[serde(default)]
    pub image: Option<String>,
}

impl ProductSummary {
    /// Price after the product's discount.
    #[must_use]
    pub fn sale_price(&self) -> Price {
        self.price.discounted(self.discount)
    }

    /// Whether the product is currently discounted.
    #[must_use]
    pub const fn on_sale(&self) -> bool {
        !self.discount.is_zero()
    }
}
