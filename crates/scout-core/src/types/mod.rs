//! Core data types for the Scout request-access layer.
//!
//! This module provides the fundamental types used throughout Scout:
//! - Request descriptions handed to the coordinator
//! - Result envelopes handed back to callers
//! - Upstream rate-limit telemetry

pub mod envelope;
pub mod rate_limit;
pub mod request;

// Re-export all public types
pub use envelope::{Envelope, ErrorDescriptor};
pub use rate_limit::RateLimitInfo;
pub use request::{Method, Request, RequestBuilder};
