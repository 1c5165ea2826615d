//! In-memory collaborators for exercising a [`CartStore`].
//!
//! Compiled for this crate's tests and, with the `testing` feature, for other
//! crates' tests.

use std::collections::HashMap;
use std::io;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use rocketshoes_core::{CartState, LineItem, ProductDetails, ProductId, StockLevel};

use crate::catalog::{ApiError, ProductCatalog, StockOracle};
use crate::codec::{self, CART_KEY};
use crate::notify::{Notice, Notifier};
use crate::storage::{KeyValueStore, MemoryStore, StorageError};
use crate::store::{CartServices, CartStore};

/// Catalog record with a title and a whole-unit price.
#[must_use]
pub fn product(id: i32, title: &str, price: u32) -> ProductDetails {
    ProductDetails::new(ProductId::new(id))
        .with_field("title", title)
        .with_field("price", price)
}

/// A cart holding `lines` in order.
///
/// # Panics
///
/// Panics on a zero quantity or a repeated product.
#[must_use]
pub fn cart_of(lines: impl IntoIterator<Item = (ProductDetails, u32)>) -> CartState {
    let items = lines
        .into_iter()
        .map(|(product, quantity)| {
            LineItem::with_quantity(
                product,
                NonZeroU32::new(quantity).expect("quantity must be at least 1"),
            )
        })
        .collect();
    CartState::from_items(items).expect("products must be unique")
}

fn unavailable() -> ApiError {
    ApiError::Api {
        status: 503,
        message: "service unavailable".to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Catalog & stock
// =============================================================================

/// Catalog answering from a map. Unknown ids are `NotFound`.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    products: Mutex<HashMap<ProductId, ProductDetails>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl FakeCatalog {
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = ProductDetails>) -> Self {
        let catalog = Self::default();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    pub fn insert(&self, product: ProductDetails) {
        lock(&self.products).insert(product.id, product);
    }

    /// Make every lookup fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Lookups made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn fetch_product(&self, id: ProductId) -> Result<ProductDetails, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        lock(&self.products)
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound(id))
    }
}

/// Stock service answering from a map. Unknown ids are `NotFound`.
///
/// Each lookup yields to the scheduler once before answering, so overlapping
/// operations interleave the way network calls would.
#[derive(Debug, Default)]
pub struct FakeStock {
    levels: Mutex<HashMap<ProductId, u32>>,
    gates: Mutex<HashMap<ProductId, Arc<Notify>>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl FakeStock {
    pub fn set(&self, id: ProductId, available: u32) {
        lock(&self.levels).insert(id, available);
    }

    /// Hold lookups for `id` until the returned gate is notified, once per
    /// lookup.
    #[must_use]
    pub fn gate(&self, id: ProductId) -> Arc<Notify> {
        Arc::clone(lock(&self.gates).entry(id).or_default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockOracle for FakeStock {
    async fn fetch_stock(&self, id: ProductId) -> Result<StockLevel, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let gate = lock(&self.gates).get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        lock(&self.levels)
            .get(&id)
            .map(|&available| StockLevel { id, available })
            .ok_or(ApiError::NotFound(id))
    }
}

// =============================================================================
// Storage & notifications
// =============================================================================

/// Memory store that counts writes and can be told to fail them.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingStore {
    /// Put `value` under `key` without counting it as a write.
    ///
    /// # Panics
    ///
    /// Never; the in-memory backend does not fail.
    pub fn seed(&self, key: &str, value: &str) {
        self.inner
            .write(key, value)
            .expect("memory store writes cannot fail");
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: PathBuf::from("memory"),
                source: io::Error::other("quota exceeded"),
            });
        }
        self.inner.write(key, value)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Notifier that keeps every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Notice> {
        lock(&self.notices).last().copied()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A full set of fakes wired into [`CartServices`].
#[derive(Debug, Default, Clone)]
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub stock: Arc<FakeStock>,
    pub storage: Arc<CountingStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate storage with `cart`, as if saved by an earlier session.
    ///
    /// # Panics
    ///
    /// Panics if the cart cannot be encoded.
    #[must_use]
    pub fn with_cart(self, cart: &CartState) -> Self {
        self.storage
            .seed(CART_KEY, &codec::encode(cart).expect("cart encodes"));
        self
    }

    #[must_use]
    pub fn services(&self) -> CartServices {
        CartServices {
            catalog: self.catalog.clone(),
            stock: self.stock.clone(),
            storage: self.storage.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Open a store over the current storage contents.
    ///
    /// # Panics
    ///
    /// Panics if the stored cart is invalid.
    #[must_use]
    pub fn open(&self) -> CartStore {
        CartStore::open(self.services()).expect("stored cart is valid")
    }
}
