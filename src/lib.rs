//! Animeshelf - local anime/TV library indexer
//!
//! This library crate exposes the scan pipeline, enrichment and store
//! wiring for the binary and for integration testing.

pub mod app;
pub mod enrichment;
pub mod scanner;
pub mod store;
