//! # ORDO Core
//!
//! Shared building blocks for the ORDO memoizing cache and priority scheduler.
//!
//! This crate provides the foundation used by all other ORDO crates:
//!
//! - **Errors**: The ambient error type for configuration and input handling
//! - **Constants**: Defaults shared by the cache and the host program
//! - **Traits**: The [`Clock`] seam that lets expiry be tested deterministically
//! - **Config**: Serializable configuration structs
//!
//! ## Example
//!
//! ```rust
//! use ordo_core::{CacheConfig, OrdoConfig};
//!
//! let config = OrdoConfig::from_json_str(r#"{ "cache": { "default_ttl_seconds": 5 } }"#)?;
//! assert_eq!(config.cache.default_ttl_seconds, 5);
//! assert_eq!(config.cache.max_entries, CacheConfig::default().max_entries);
//! # Ok::<(), ordo_core::OrdoError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod traits;

// Re-export commonly used items at crate root
pub use config::*;
pub use constants::*;
pub use error::{OrdoError, Result};
pub use traits::*;
