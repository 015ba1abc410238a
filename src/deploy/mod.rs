//! Storage adapters
pub mod local;
