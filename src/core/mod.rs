//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod hydrate;
pub mod log;
pub mod quote;
pub mod settings;
pub mod watchlist;

// Re-export main types for cleaner imports
pub use cache::{KeyValueCollection, Store, StoreError, TtlCache};
pub use quote::{Quote, QuoteProvider};
