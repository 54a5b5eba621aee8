//! Client-side read-through cache for a REST entity store.

pub mod cache;
pub mod config;
pub mod error;
pub mod rest;

pub use cache::RangeCache;
pub use config::Config;
pub use error::{CacheError, Result};
