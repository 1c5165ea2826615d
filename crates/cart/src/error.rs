//! Cart error taxonomy.
//!
//! Every failure inside a cart operation becomes a `CartError`. The store
//! catches it at the operation boundary, logs it, and turns it into a
//! [`Notice`](crate::notify::Notice); callers never receive it directly.

use rocketshoes_core::{CartStateError, ProductId};
use thiserror::Error;

use crate::catalog::ApiError;
use crate::codec::CodecError;
use crate::storage::StorageError;

/// Cart operation error.
#[derive(Debug, Error)]
pub enum CartError {
    /// The catalog has no such product.
    #[error("product {0} not found in catalog")]
    NotFoundInCatalog(ProductId),

    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotFoundInCart(ProductId),

    /// Not enough stock to raise the quantity.
    #[error("insufficient stock for product {id}: {available} available, {in_cart} in cart")]
    StockInsufficient {
        id: ProductId,
        available: u32,
        in_cart: u32,
    },

    /// Requested quantity cannot be represented.
    #[error("quantity {requested} for product {id} is out of range")]
    QuantityOutOfRange { id: ProductId, requested: i64 },

    /// The catalog or stock service could not be reached or misbehaved.
    #[error("catalog request failed: {0}")]
    Transport(#[source] ApiError),

    /// The key-value store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Persisted cart data did not decode.
    #[error("persisted cart rejected: {0}")]
    CorruptState(#[from] CodecError),

    /// A computed cart broke a structural invariant.
    #[error("invalid cart state: {0}")]
    InvalidState(#[from] CartStateError),
}

impl CartError {
    /// Classify a collaborator failure for `id`.
    #[must_use]
    pub fn from_catalog(id: ProductId, error: ApiError) -> Self {
        if error.is_not_found() {
            Self::NotFoundInCatalog(id)
        } else {
            Self::Transport(error)
        }
    }

    /// The coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFoundInCatalog(_) => ErrorKind::NotFoundInCatalog,
            Self::NotFoundInCart(_) => ErrorKind::NotFoundInCart,
            Self::StockInsufficient { .. } | Self::QuantityOutOfRange { .. } => {
                ErrorKind::StockInsufficient
            }
            Self::Transport(_) => ErrorKind::Transport,
            Self::Storage(_) => ErrorKind::Storage,
            Self::CorruptState(_) | Self::InvalidState(_) => ErrorKind::CorruptState,
        }
    }
}

/// Coarse classification of a [`CartError`], carried on every notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFoundInCatalog,
    NotFoundInCart,
    StockInsufficient,
    Transport,
    Storage,
    CorruptState,
}
