//! shelf-core: shared types, IDs, errors, configuration, and event bus.
//!
//! This crate is the foundational dependency for the other shelf-* crates,
//! providing type-safe identifiers, a unified error type, the video file
//! table, application configuration, and the in-process event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
