//! Caching for the Jenkins MCP Gateway.
//!
//! This module provides the TTL cache used for read-mostly upstream queries and the
//! key scheme that ties cached reads to the writes that invalidate them.

pub mod keys;
pub mod manager;

pub use keys::Stale;
pub use manager::{CacheEntryInfo, CacheManager, CacheStats};
