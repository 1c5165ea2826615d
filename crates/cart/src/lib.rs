//! RocketShoes cart store.
//!
//! Holds a shopper's cart, keeps it in a durable key-value store, and checks
//! quantity increases against the stock service before applying them.
//!
//! # Modules
//!
//! - [`store`] - [`CartStore`]: add, remove and set-quantity operations plus
//!   snapshot/subscribe access for observers
//! - [`catalog`] - Product catalog and stock service collaborators, with the
//!   REST client and a product details cache
//! - [`storage`] - Key-value persistence (in-memory and file-backed)
//! - [`codec`] - Validated encoding of the cart at the storage boundary
//! - [`notify`] - Shopper-facing failure notices
//! - [`config`] - Configuration from environment variables
//! - [`error`] - Error taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod notify;
pub mod storage;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::CartConfig;
pub use error::{CartError, ErrorKind};
pub use notify::{Notice, Notifier, Toast};
pub use store::{CartServices, CartStore, Outcome};
