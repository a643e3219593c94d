//! HTTP API gateway for the shop backend.
//!
//! Serves the catalog, cart, checkout and account endpoints under
//! `/api/v1`, backed by a [`shop_store::Store`].

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod session;
pub mod state;
pub mod telemetry;
