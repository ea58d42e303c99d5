//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`http`] - In-process HTTP responder that records every request.
//! - [`ws`] - Local WebSocket server that can push frames and drop clients.
//! - [`config`] - Canonical configurations with test-friendly timings.

pub mod config;
pub mod http;
pub mod ws;
