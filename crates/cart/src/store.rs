//! The cart store.
//!
//! [`CartStore`] owns the live [`CartState`] for a session. Each operation
//! starts from the snapshot current when it was called, may consult the
//! catalog or the stock service, and then either commits a complete new state
//! or leaves everything as it was and emits a [`Notice`].
//!
//! A commit writes the encoded cart to the key-value store first and only then
//! publishes it to observers, so observers never see a state that failed to
//! persist.
//!
//! Operations are not serialized against each other. Two calls that overlap
//! both start from the same snapshot and the one that commits last wins.

use std::num::NonZeroU32;
use std::sync::Arc;

use rocketshoes_core::{CartState, ProductId};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{ApiClient, ApiError, CachedCatalog, ProductCatalog, StockOracle};
use crate::codec::{self, CART_KEY};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::notify::{Notice, Notifier, Toast};
use crate::storage::{FileStore, KeyValueStore};

/// Collaborators a [`CartStore`] is built from.
#[derive(Clone)]
pub struct CartServices {
    pub catalog: Arc<dyn ProductCatalog>,
    pub stock: Arc<dyn StockOracle>,
    pub storage: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl CartServices {
    /// Services talking to the configured catalog API and storage file.
    ///
    /// Product details go through a [`CachedCatalog`] unless the configured
    /// TTL is zero; stock always hits the API.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client fails to build.
    pub fn from_config(
        config: &CartConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let client = ApiClient::new(&config.api)?;

        let catalog: Arc<dyn ProductCatalog> = if config.api.catalog_cache_ttl.is_zero() {
            Arc::new(client.clone())
        } else {
            Arc::new(CachedCatalog::new(
                client.clone(),
                config.api.catalog_cache_ttl,
            ))
        };

        Ok(Self {
            catalog,
            stock: Arc::new(client),
            storage: Arc::new(FileStore::new(&config.storage_path)),
            notifier,
        })
    }
}

/// Whether an operation changed the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new state was persisted and published.
    Applied,
    /// Nothing changed, either by rule or because the operation failed.
    Unchanged,
}

impl Outcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A failed operation: what the shopper is told and why.
struct Rejection {
    toast: Toast,
    error: CartError,
}

impl Rejection {
    const fn new(toast: Toast, error: CartError) -> Self {
        Self { toast, error }
    }
}

/// Handle to a session's cart.
///
/// Cheap to clone; clones share the same state and collaborators.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    services: CartServices,
    state: watch::Sender<CartState>,
}

impl CartStore {
    /// Load the cart persisted under [`CART_KEY`], or start empty.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the store cannot be read and
    /// `CartError::CorruptState` if the stored cart fails validation.
    #[instrument(skip(services))]
    pub fn open(services: CartServices) -> Result<Self, CartError> {
        let state = match services.storage.read(CART_KEY)? {
            Some(raw) => codec::decode(&raw)?,
            None => CartState::new(),
        };

        info!(lines = state.len(), items = state.item_count(), "Cart loaded");

        let (state, _) = watch::channel(state);

        Ok(Self {
            inner: Arc::new(CartStoreInner { services, state }),
        })
    }

    /// The current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that observes every committed cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Add one unit of `id`.
    ///
    /// A product already in the cart goes through
    /// [`update_product_amount`](Self::update_product_amount) with its
    /// quantity plus one, which re-checks stock. A new product is fetched from
    /// the catalog and appended with quantity 1.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add_product(&self, id: ProductId) -> Outcome {
        let result = self.try_add_product(id).await;
        self.settle(result)
    }

    /// Remove `id` from the cart, keeping the order of the other lines.
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn remove_product(&self, id: ProductId) -> Outcome {
        let result = self.try_remove_product(id);
        self.settle(result)
    }

    /// Set the quantity of `id` to `amount`.
    ///
    /// Non-positive amounts are ignored. Decreases apply directly. Anything
    /// else is allowed only while the stock service reports more units than
    /// are currently in the cart.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn update_product_amount(&self, id: ProductId, amount: i64) -> Outcome {
        let result = self.try_update_product_amount(id, amount).await;
        self.settle(result)
    }

    async fn try_add_product(&self, id: ProductId) -> Result<Outcome, Rejection> {
        let snapshot = self.snapshot();

        if let Some(line) = snapshot.get(id) {
            let amount = i64::from(line.quantity()) + 1;
            debug!(amount, "Product already in cart, raising quantity");
            return self.try_update_product_amount(id, amount).await;
        }

        let product = self
            .inner
            .services
            .catalog
            .fetch_product(id)
            .await
            .map_err(|e| Rejection::new(Toast::AddFailed, CartError::from_catalog(id, e)))?;

        if product.id != id {
            warn!(returned = %product.id, "Catalog returned a different product");
            return Err(Rejection::new(
                Toast::AddFailed,
                CartError::NotFoundInCatalog(id),
            ));
        }

        let next = snapshot
            .with_product(product)
            .map_err(|e| Rejection::new(Toast::AddFailed, e.into()))?;

        self.commit(next)
            .map_err(|e| Rejection::new(Toast::AddFailed, e))?;

        info!("Product added to cart");
        Ok(Outcome::Applied)
    }

    fn try_remove_product(&self, id: ProductId) -> Result<Outcome, Rejection> {
        let next = self
            .snapshot()
            .without(id)
            .ok_or_else(|| Rejection::new(Toast::RemoveFailed, CartError::NotFoundInCart(id)))?;

        self.commit(next)
            .map_err(|e| Rejection::new(Toast::RemoveFailed, e))?;

        info!("Product removed from cart");
        Ok(Outcome::Applied)
    }

    async fn try_update_product_amount(
        &self,
        id: ProductId,
        amount: i64,
    ) -> Result<Outcome, Rejection> {
        let snapshot = self.snapshot();

        let current = snapshot
            .get(id)
            .map(rocketshoes_core::LineItem::quantity)
            .ok_or_else(|| Rejection::new(Toast::UpdateFailed, CartError::NotFoundInCart(id)))?;

        if amount <= 0 {
            debug!(amount, "Ignoring non-positive amount");
            return Ok(Outcome::Unchanged);
        }

        if amount < i64::from(current) {
            return self.apply_quantity(&snapshot, id, to_quantity(id, amount)?);
        }

        // Equal amounts take this branch too. The stock is compared with the
        // quantity already in the cart, not with `amount`.
        let stock = self
            .inner
            .services
            .stock
            .fetch_stock(id)
            .await
            .map_err(|e| Rejection::new(Toast::AddFailed, CartError::from_catalog(id, e)))?;

        if !stock.exceeds(current) {
            return Err(Rejection::new(
                Toast::OutOfStock,
                CartError::StockInsufficient {
                    id,
                    available: stock.available,
                    in_cart: current,
                },
            ));
        }

        self.apply_quantity(&snapshot, id, to_quantity(id, amount)?)
    }

    fn apply_quantity(
        &self,
        snapshot: &CartState,
        id: ProductId,
        quantity: NonZeroU32,
    ) -> Result<Outcome, Rejection> {
        let next = snapshot
            .with_quantity(id, quantity)
            .ok_or_else(|| Rejection::new(Toast::UpdateFailed, CartError::NotFoundInCart(id)))?;

        self.commit(next)
            .map_err(|e| Rejection::new(Toast::AddFailed, e))?;

        info!(quantity = quantity.get(), "Product quantity updated");
        Ok(Outcome::Applied)
    }

    // =========================================================================
    // Commit & failure handling
    // =========================================================================

    /// Persist `next`, then publish it. Exactly one storage write per call.
    fn commit(&self, next: CartState) -> Result<(), CartError> {
        let raw = codec::encode(&next)?;
        self.inner.services.storage.write(CART_KEY, &raw)?;

        debug!(lines = next.len(), items = next.item_count(), "Cart committed");
        self.inner.state.send_replace(next);
        Ok(())
    }

    fn settle(&self, result: Result<Outcome, Rejection>) -> Outcome {
        match result {
            Ok(outcome) => outcome,
            Err(Rejection { toast, error }) => {
                warn!(error = %error, toast = %toast, "Cart operation rejected");
                self.inner
                    .services
                    .notifier
                    .notify(Notice::new(toast, error.kind()));
                Outcome::Unchanged
            }
        }
    }
}

/// `amount` as a line quantity. Amounts the cart cannot hold are out of stock.
fn to_quantity(id: ProductId, amount: i64) -> Result<NonZeroU32, Rejection> {
    u32::try_from(amount)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| {
            Rejection::new(
                Toast::OutOfStock,
                CartError::QuantityOutOfRange {
                    id,
                    requested: amount,
                },
            )
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rocketshoes_core::ProductDetails;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{Harness, cart_of, product};

    fn pid(id: i32) -> ProductId {
        ProductId::new(id)
    }

    fn quantities(cart: &CartState) -> Vec<(i32, u32)> {
        cart.iter()
            .map(|line| (line.id().as_i32(), line.quantity()))
            .collect()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn test_open_without_stored_cart_is_empty() {
        let harness = Harness::new();
        let store = harness.open();
        assert!(store.snapshot().is_empty());
        assert_eq!(harness.storage.writes(), 0);
    }

    #[test]
    fn test_open_rejects_corrupt_cart() {
        let harness = Harness::new();
        harness
            .storage
            .seed(CART_KEY, r#"[{"id":1,"title":"Shoe","price":10,"amount":0}]"#);

        let err = CartStore::open(harness.services()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }

    #[tokio::test]
    async fn test_reopen_restores_identical_cart() {
        let harness = Harness::new();
        harness.catalog.insert(product(42, "Shoe", 100));
        harness.catalog.insert(product(7, "Boot", 250));
        harness.stock.set(pid(42), 10);

        let store = harness.open();
        store.add_product(pid(42)).await;
        store.add_product(pid(7)).await;
        store.add_product(pid(42)).await;

        let reopened = harness.open();
        assert_eq!(reopened.snapshot(), store.snapshot());
        assert_eq!(quantities(&reopened.snapshot()), vec![(42, 2), (7, 1)]);
    }

    // =========================================================================
    // add_product
    // =========================================================================

    #[tokio::test]
    async fn test_add_new_product_appends_single_unit() {
        let harness = Harness::new();
        harness.catalog.insert(product(42, "Shoe", 100));
        let store = harness.open();

        assert_eq!(store.add_product(pid(42)).await, Outcome::Applied);

        assert_eq!(store.snapshot(), cart_of([(product(42, "Shoe", 100), 1)]));
        assert_eq!(harness.storage.writes(), 1);
        assert_eq!(harness.stock.calls(), 0);
        assert!(harness.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_product_reports_add_failed() {
        let harness = Harness::new();
        let store = harness.open();

        assert_eq!(store.add_product(pid(99)).await, Outcome::Unchanged);

        assert!(store.snapshot().is_empty());
        assert_eq!(harness.storage.writes(), 0);
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::AddFailed, ErrorKind::NotFoundInCatalog)]
        );
    }

    #[tokio::test]
    async fn test_add_with_catalog_down_reports_add_failed() {
        let harness = Harness::new();
        harness.catalog.insert(product(1, "Shoe", 100));
        harness.catalog.set_unavailable(true);
        let store = harness.open();

        assert_eq!(store.add_product(pid(1)).await, Outcome::Unchanged);
        assert_eq!(
            harness.notifier.last(),
            Some(Notice::new(Toast::AddFailed, ErrorKind::Transport))
        );
    }

    #[tokio::test]
    async fn test_add_existing_product_increments_when_stock_exceeds_quantity() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 3);
        let store = harness.open();

        assert_eq!(store.add_product(pid(5)).await, Outcome::Applied);

        assert_eq!(quantities(&store.snapshot()), vec![(5, 3)]);
        assert_eq!(harness.catalog.calls(), 0);
        assert_eq!(harness.stock.calls(), 1);
    }

    #[tokio::test]
    async fn test_add_existing_product_out_of_stock() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 2);
        let store = harness.open();

        assert_eq!(store.add_product(pid(5)).await, Outcome::Unchanged);

        assert_eq!(quantities(&store.snapshot()), vec![(5, 2)]);
        assert_eq!(harness.storage.writes(), 0);
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::OutOfStock, ErrorKind::StockInsufficient)]
        );
    }

    #[tokio::test]
    async fn test_add_with_failing_storage_leaves_state_intact() {
        let harness = Harness::new();
        harness.catalog.insert(product(1, "Shoe", 100));
        harness.storage.set_fail_writes(true);
        let store = harness.open();
        let mut observer = store.subscribe();

        assert_eq!(store.add_product(pid(1)).await, Outcome::Unchanged);

        assert!(store.snapshot().is_empty());
        assert!(!observer.has_changed().unwrap());
        assert_eq!(
            harness.notifier.last(),
            Some(Notice::new(Toast::AddFailed, ErrorKind::Storage))
        );
    }

    // =========================================================================
    // remove_product
    // =========================================================================

    #[test]
    fn test_remove_keeps_order_of_remaining_lines() {
        let harness = Harness::new().with_cart(&cart_of([
            (product(1, "A", 10), 1),
            (product(2, "B", 10), 2),
            (product(3, "C", 10), 3),
        ]));
        let store = harness.open();

        assert_eq!(store.remove_product(pid(2)), Outcome::Applied);

        assert_eq!(quantities(&store.snapshot()), vec![(1, 1), (3, 3)]);
        assert_eq!(harness.storage.writes(), 1);
    }

    #[test]
    fn test_remove_twice_fails_second_time_without_mutation() {
        let harness = Harness::new().with_cart(&cart_of([(product(1, "A", 10), 1)]));
        let store = harness.open();

        assert_eq!(store.remove_product(pid(1)), Outcome::Applied);
        let after_first = store.snapshot();

        assert_eq!(store.remove_product(pid(1)), Outcome::Unchanged);
        assert_eq!(store.snapshot(), after_first);
        assert_eq!(harness.storage.writes(), 1);
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::RemoveFailed, ErrorKind::NotFoundInCart)]
        );
    }

    #[test]
    fn test_remove_with_failing_storage_reports_remove_failed() {
        let harness = Harness::new().with_cart(&cart_of([(product(1, "A", 10), 1)]));
        harness.storage.set_fail_writes(true);
        let store = harness.open();

        assert_eq!(store.remove_product(pid(1)), Outcome::Unchanged);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(
            harness.notifier.last(),
            Some(Notice::new(Toast::RemoveFailed, ErrorKind::Storage))
        );
    }

    // =========================================================================
    // update_product_amount
    // =========================================================================

    #[tokio::test]
    async fn test_update_missing_product_reports_update_failed() {
        let harness = Harness::new();
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(3), 2).await,
            Outcome::Unchanged
        );
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::UpdateFailed, ErrorKind::NotFoundInCart)]
        );
    }

    #[tokio::test]
    async fn test_update_to_zero_is_silent_no_op() {
        let harness = Harness::new().with_cart(&cart_of([(product(1, "A", 10), 3)]));
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(1), 0).await,
            Outcome::Unchanged
        );
        assert_eq!(
            store.update_product_amount(pid(1), -4).await,
            Outcome::Unchanged
        );

        assert_eq!(quantities(&store.snapshot()), vec![(1, 3)]);
        assert!(harness.notifier.notices().is_empty());
        assert_eq!(harness.storage.writes(), 0);
        assert_eq!(harness.stock.calls(), 0);
    }

    #[tokio::test]
    async fn test_decrease_skips_stock_check() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), 1).await,
            Outcome::Applied
        );

        assert_eq!(quantities(&store.snapshot()), vec![(5, 1)]);
        assert_eq!(harness.stock.calls(), 0);
        assert_eq!(harness.storage.writes(), 1);
    }

    #[tokio::test]
    async fn test_increase_blocked_when_stock_equals_quantity() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 2);
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), 3).await,
            Outcome::Unchanged
        );

        assert_eq!(quantities(&store.snapshot()), vec![(5, 2)]);
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::OutOfStock, ErrorKind::StockInsufficient)]
        );
    }

    #[tokio::test]
    async fn test_increase_checks_stock_against_current_quantity() {
        // 3 available > 2 in cart, so a jump to 10 is accepted
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 3);
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), 10).await,
            Outcome::Applied
        );
        assert_eq!(quantities(&store.snapshot()), vec![(5, 10)]);
    }

    #[tokio::test]
    async fn test_equal_amount_goes_through_stock_check() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 5);
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), 2).await,
            Outcome::Applied
        );
        assert_eq!(harness.stock.calls(), 1);
        assert_eq!(harness.storage.writes(), 1);
    }

    #[tokio::test]
    async fn test_stock_service_failure_reports_add_failed() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 10);
        harness.stock.set_unavailable(true);
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), 3).await,
            Outcome::Unchanged
        );
        assert_eq!(
            harness.notifier.notices(),
            vec![Notice::new(Toast::AddFailed, ErrorKind::Transport)]
        );
    }

    #[tokio::test]
    async fn test_amount_beyond_quantity_range_is_out_of_stock() {
        let harness = Harness::new().with_cart(&cart_of([(product(5, "Boot", 250), 2)]));
        harness.stock.set(pid(5), 10);
        let store = harness.open();

        assert_eq!(
            store.update_product_amount(pid(5), i64::MAX).await,
            Outcome::Unchanged
        );
        assert_eq!(
            harness.notifier.last(),
            Some(Notice::new(Toast::OutOfStock, ErrorKind::StockInsufficient))
        );
    }

    #[test]
    fn test_quantity_conversion_has_one_failure_toast() {
        assert_eq!(to_quantity(pid(1), 3).ok().map(NonZeroU32::get), Some(3));

        for amount in [0, -1, i64::from(u32::MAX) + 1] {
            let rejection = to_quantity(pid(1), amount).err().unwrap();
            assert_eq!(rejection.toast, Toast::OutOfStock);
            assert_eq!(rejection.error.kind(), ErrorKind::StockInsufficient);
        }
    }

    #[tokio::test]
    async fn test_add_product_without_price_keeps_catalog_record() {
        let harness = Harness::new();
        let gift = ProductDetails::new(pid(9))
            .with_field("title", "Gift card")
            .with_field("brand", "Acme");
        harness.catalog.insert(gift.clone());
        let store = harness.open();

        assert_eq!(store.add_product(pid(9)).await, Outcome::Applied);

        let line = store.snapshot().get(pid(9)).cloned().unwrap();
        assert_eq!(line.product(), &gift);
        assert!(line.line_total().is_none());
        assert!(harness.notifier.notices().is_empty());
        assert_eq!(harness.open().snapshot(), store.snapshot());
    }

    // =========================================================================
    // Observers & concurrency
    // =========================================================================

    #[tokio::test]
    async fn test_subscribers_see_committed_state() {
        let harness = Harness::new();
        harness.catalog.insert(product(42, "Shoe", 100));
        let store = harness.open();
        let mut observer = store.subscribe();

        let watcher = tokio::spawn(async move {
            observer.changed().await.unwrap();
            observer.borrow_and_update().clone()
        });

        store.add_product(pid(42)).await;

        let seen = watcher.await.unwrap();
        assert_eq!(seen, store.snapshot());
        assert_eq!(seen.item_count(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_updates_last_write_wins() {
        let harness = Harness::new().with_cart(&cart_of([
            (product(1, "A", 10), 1),
            (product(2, "B", 10), 1),
        ]));
        harness.stock.set(pid(1), 5);
        harness.stock.set(pid(2), 5);
        let store = harness.open();

        let gate_1 = harness.stock.gate(pid(1));
        let gate_2 = harness.stock.gate(pid(2));

        // Both start from the same snapshot. Product 2 commits first, then
        // product 1's commit overwrites it.
        let release = async {
            gate_2.notify_one();
            while harness.storage.writes() < 1 {
                tokio::task::yield_now().await;
            }
            gate_1.notify_one();
        };
        let (first, second, ()) = tokio::join!(
            store.update_product_amount(pid(1), 2),
            store.update_product_amount(pid(2), 2),
            release,
        );

        assert!(first.is_applied() && second.is_applied());
        assert_eq!(quantities(&store.snapshot()), vec![(1, 2), (2, 1)]);
        assert_eq!(harness.storage.writes(), 2);
        assert_eq!(harness.open().snapshot(), store.snapshot());
    }
}
