//! Request-access layer for the package-metadata registry API
//!
//! This crate owns every call to the upstream registry: a sliding-window rate
//! budget, a TTL result cache, a retrying HTTP transport, and the coordinator
//! that composes them behind one `execute` call returning an `Envelope`.

pub mod api;
pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod rate;
pub mod settings;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use cache::{CacheEntry, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, TokioClock};
pub use coordinator::{CoordinatorConfig, RequestCoordinator};
pub use rate::{Admission, BudgetSnapshot, RateBudget};
pub use settings::RegistrySettings;
pub use transport::{
    backoff_delay, HttpUpstream, HttpUpstreamConfig, ResilientTransport, RetryConfig, Upstream,
    UpstreamFailure, UpstreamResponse,
};

use scout_core::error::ScoutError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, ScoutError>;
