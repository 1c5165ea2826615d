//! RocketShoes Core - Shared cart types.
//!
//! This crate provides the domain types used by the cart store and its tools:
//! - `cart` - The cart store library (catalog client, persistence, observers)
//! - `cli` - Command-line front end for inspecting and editing a cart
//!
//! # Architecture
//!
//! The core crate contains only types and their invariants - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product ids, prices, product details, stock levels and the
//!   cart state itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
