//! Database query modules.

pub mod directories;
pub mod episodes;
pub mod metadata;
pub mod series;
