//! Zenith Market Core - Shared types library.
//!
//! This crate provides the domain types used across the Zenith Market crates:
//! - `storefront` - Catalog, filtering, carts, recommendations and the HTTP API
//! - `cli` - Catalog inspection tools
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no mutable
//! state. Catalog and cart behaviour lives in the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices and the product record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
