//! Stock levels reported by the stock service.

use serde::{Deserialize, Serialize};

use super::ProductId;

/// Units of a product currently available.
///
/// Always fetched fresh before an increase is applied; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Product the level refers to.
    pub id: ProductId,
    /// Available units.
    #[serde(rename = "amount")]
    pub available: u32,
}

impl StockLevel {
    /// Whether more units exist than `quantity`.
    #[must_use]
    pub const fn exceeds(&self, quantity: u32) -> bool {
        self.available > quantity
    }
}
