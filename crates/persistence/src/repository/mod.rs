//! Repository implementations for database operations

pub mod snapshots;

pub use snapshots::*;
