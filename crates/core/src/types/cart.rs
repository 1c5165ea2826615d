//! Cart line items and the cart state.
//!
//! `CartState` is an immutable snapshot: every mutation produces a new value,
//! so a snapshot handed to an observer never changes underneath it.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Price, ProductDetails, ProductId};

/// Violations of the cart's structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartStateError {
    /// The same product appears on more than one line.
    #[error("product {0} appears more than once in the cart")]
    DuplicateProduct(ProductId),
}

/// One product in the cart together with its quantity.
///
/// Serialized flat: the catalog record with the quantity added under
/// `amount`, e.g. `{"id":42,"name":"Shoe","price":100,"amount":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(flatten)]
    product: ProductDetails,
    #[serde(rename = "amount")]
    quantity: NonZeroU32,
}

impl LineItem {
    /// A fresh line holding a single unit of `product`.
    #[must_use]
    pub fn new(product: ProductDetails) -> Self {
        Self::with_quantity(product, NonZeroU32::MIN)
    }

    /// A line with an explicit quantity.
    ///
    /// An `amount` field on the catalog record is dropped; the line's own
    /// quantity takes that key.
    #[must_use]
    pub fn with_quantity(mut product: ProductDetails, quantity: NonZeroU32) -> Self {
        product.remove_field("amount");
        Self { product, quantity }
    }

    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.product.id
    }

    #[must_use]
    pub const fn product(&self) -> &ProductDetails {
        &self.product
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    /// Unit price times quantity, when the product has a readable price.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.product
            .price()
            .map(|price| price.times(self.quantity.get()))
    }
}

/// Ordered, duplicate-free sequence of line items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartState {
    #[serde(deserialize_with = "deserialize_items")]
    items: Vec<LineItem>,
}

fn deserialize_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let items = Vec::<LineItem>::deserialize(deserializer)?;
    check_unique(&items).map_err(serde::de::Error::custom)?;
    Ok(items)
}

fn check_unique(items: &[LineItem]) -> Result<(), CartStateError> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(CartStateError::DuplicateProduct(item.id()));
        }
    }
    Ok(())
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from line items, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `CartStateError::DuplicateProduct` if two lines share a product.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self, CartStateError> {
        check_unique(&items)?;
        Ok(Self { items })
    }

    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line for `id`, if the product is in the cart.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// A copy of this cart with `product` appended at quantity 1.
    ///
    /// # Errors
    ///
    /// Returns `CartStateError::DuplicateProduct` if the product is already
    /// present; re-adding goes through a quantity change instead.
    pub fn with_product(&self, product: ProductDetails) -> Result<Self, CartStateError> {
        if self.contains(product.id) {
            return Err(CartStateError::DuplicateProduct(product.id));
        }
        let mut items = self.items.clone();
        items.push(LineItem::new(product));
        Ok(Self { items })
    }

    /// A copy of this cart without `id`, or `None` if it isn't present.
    #[must_use]
    pub fn without(&self, id: ProductId) -> Option<Self> {
        if !self.contains(id) {
            return None;
        }
        let items = self
            .items
            .iter()
            .filter(|item| item.id() != id)
            .cloned()
            .collect();
        Some(Self { items })
    }

    /// A copy of this cart with the quantity of `id` replaced, or `None` if
    /// it isn't present. The line keeps its position.
    #[must_use]
    pub fn with_quantity(&self, id: ProductId, quantity: NonZeroU32) -> Option<Self> {
        if !self.contains(id) {
            return None;
        }
        let items = self
            .items
            .iter()
            .map(|item| {
                if item.id() == id {
                    LineItem::with_quantity(item.product.clone(), quantity)
                } else {
                    item.clone()
                }
            })
            .collect();
        Some(Self { items })
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity())).sum()
    }

    /// Sum of all line totals. Lines without a readable price count as zero.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().filter_map(LineItem::line_total).sum()
    }
}

impl<'a> IntoIterator for &'a CartState {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: u32) -> ProductDetails {
        ProductDetails::new(ProductId::new(id))
            .with_field("title", format!("Shoe {id}"))
            .with_field("price", price)
    }

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_with_product_appends_single_unit() {
        let cart = CartState::new().with_product(product(1, 100)).unwrap();
        let cart = cart.with_product(product(2, 50)).unwrap();

        let ids: Vec<_> = cart.iter().map(LineItem::id).collect();
        assert_eq!(ids, vec![ProductId::new(1), ProductId::new(2)]);
        assert_eq!(cart.get(ProductId::new(2)).unwrap().quantity(), 1);
    }

    #[test]
    fn test_with_product_rejects_duplicate() {
        let cart = CartState::new().with_product(product(1, 100)).unwrap();
        assert_eq!(
            cart.with_product(product(1, 100)),
            Err(CartStateError::DuplicateProduct(ProductId::new(1)))
        );
    }

    #[test]
    fn test_without_preserves_order() {
        let cart = CartState::from_items(vec![
            LineItem::new(product(1, 10)),
            LineItem::new(product(2, 10)),
            LineItem::new(product(3, 10)),
        ])
        .unwrap();

        let cart = cart.without(ProductId::new(2)).unwrap();
        let ids: Vec<_> = cart.iter().map(|item| item.id().as_i32()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(cart.without(ProductId::new(2)).is_none());
    }

    #[test]
    fn test_with_quantity_keeps_position() {
        let cart = CartState::from_items(vec![
            LineItem::new(product(1, 10)),
            LineItem::new(product(2, 10)),
        ])
        .unwrap();

        let cart = cart.with_quantity(ProductId::new(1), qty(4)).unwrap();
        assert_eq!(cart.items()[0].id(), ProductId::new(1));
        assert_eq!(cart.items()[0].quantity(), 4);
        assert!(cart.with_quantity(ProductId::new(9), qty(1)).is_none());
    }

    #[test]
    fn test_totals() {
        let cart = CartState::from_items(vec![
            LineItem::with_quantity(product(1, 100), qty(2)),
            LineItem::with_quantity(product(2, 50), qty(3)),
        ])
        .unwrap();

        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.subtotal(), Price::from_units(350));
    }

    #[test]
    fn test_subtotal_skips_unpriced_lines() {
        let gift = ProductDetails::new(ProductId::new(9)).with_field("title", "Gift card");
        let cart = CartState::from_items(vec![
            LineItem::with_quantity(product(1, 100), qty(2)),
            LineItem::new(gift),
        ])
        .unwrap();

        assert!(cart.get(ProductId::new(9)).unwrap().line_total().is_none());
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), Price::from_units(200));
    }

    #[test]
    fn test_catalog_amount_field_is_replaced_by_quantity() {
        let product = product(1, 10).with_field("amount", 50);
        let line = LineItem::with_quantity(product, qty(2));

        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["amount"], 2);
    }

    #[test]
    fn test_deserialize_rejects_zero_amount_and_duplicates() {
        let zero = r#"[{"id":1,"title":"Shoe","price":10,"amount":0}]"#;
        assert!(serde_json::from_str::<CartState>(zero).is_err());

        let dup = r#"[{"id":1,"title":"Shoe","price":10,"amount":1},{"id":1,"title":"Shoe","price":10,"amount":2}]"#;
        assert!(serde_json::from_str::<CartState>(dup).is_err());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = r#"[{"id":42,"name":"Shoe","price":100,"brand":"Acme","amount":3}]"#;
        let cart: CartState = serde_json::from_str(raw).unwrap();

        let line = cart.get(ProductId::new(42)).unwrap();
        assert_eq!(line.quantity(), 3);
        assert!(line.product().field("amount").is_none());
        assert_eq!(
            serde_json::to_value(&cart).unwrap(),
            serde_json::from_str::<serde_json::Value>(raw).unwrap()
        );
    }

    #[test]
    fn test_serialized_shape_is_flat_array() {
        let cart = CartState::from_items(vec![LineItem::with_quantity(product(42, 100), qty(1))])
            .unwrap();
        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"id": 42, "title": "Shoe 42", "price": 100, "amount": 1}])
        );
    }
}
