//! Encoding of the cart at the storage boundary.
//!
//! The persisted form is a plain JSON array of catalog records, each with its
//! quantity under `amount`:
//!
//! ```json
//! [{"id":1,"title":"Tênis de Caminhada","price":179.9,"image":"https://...","amount":2}]
//! ```
//!
//! Decoding checks only what the cart relies on: an array of objects with an
//! integer `id`, an `amount` of at least 1, and no product listed twice. All
//! other fields are carried through untouched.

use rocketshoes_core::CartState;
use thiserror::Error;

/// Storage key holding the serialized cart.
pub const CART_KEY: &str = "@RocketShoes:cart";

/// Errors converting a cart to or from its stored form.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode cart: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored cart is invalid: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize `cart` for storage.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode(cart: &CartState) -> Result<String, CodecError> {
    serde_json::to_string(cart).map_err(CodecError::Encode)
}

/// Parse and validate a stored cart.
///
/// # Errors
///
/// Returns `CodecError::Decode` if `raw` is not a valid cart.
pub fn decode(raw: &str) -> Result<CartState, CodecError> {
    serde_json::from_str(raw).map_err(CodecError::Decode)
}
