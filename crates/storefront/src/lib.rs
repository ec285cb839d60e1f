//! Zenith Market storefront library.
//!
//! Catalog, filtering, per-session carts, AI recommendations and checkout,
//! served as a JSON API. Exposed as a library so the binary, the CLI and the
//! integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod recommendations;
pub mod routes;
pub mod state;
