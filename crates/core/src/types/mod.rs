//! Core types for RocketShoes.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod stock;

pub use cart::{CartState, CartStateError, LineItem};
pub use id::ProductId;
pub use price::Price;
pub use product::ProductDetails;
pub use stock::StockLevel;
