//! # scout-core
//!
//! Core types and utilities shared across all Scout crates.
//!
//! This crate provides:
//! - ScoutError enum and the stable ErrorKind taxonomy
//! - Request, the immutable description of one upstream call
//! - Envelope, the uniform success/failure shape handed back to every caller
//! - Request fingerprinting used for cache keys
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Request, Envelope, RateLimitInfo)
//! - `error`: Error types and result aliases
//! - `utils`: Hashing helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{ErrorKind, ScoutError, ScoutResult};
pub use types::{Envelope, ErrorDescriptor, Method, RateLimitInfo, Request, RequestBuilder};
