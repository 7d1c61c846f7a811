//! Core types and algorithms for the Frekwencja attendance tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! aggregator and the absence planner are pure functions of their inputs; the
//! storage backends and the API layer depend on this crate, never the other
//! way around.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod calendar;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod plan;
pub mod planner;
pub mod settings;
pub mod state;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
