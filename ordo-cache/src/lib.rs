//! TTL memoizing cache for ORDO.
//!
//! Wraps a caller-supplied computation, remembering its result per key until
//! the per-call TTL runs out, then recomputing lazily on the next access.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use ordo_cache::MemoCache;
//!
//! let cache = MemoCache::new();
//! let square = |x: &i64| x * x;
//!
//! assert_eq!(cache.execute(4, square, Duration::from_secs(5)), 16);
//! // Served from the table; `square` is not called again.
//! assert_eq!(cache.execute(4, square, Duration::from_secs(5)), 16);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheStats, MemoCache};
pub use ordo_core::config::CacheConfig;
