//! Reliability policies applied by the pool.
//!
//! ```text
//! Call → [select: CircuitBreaker::is_available] → [Transport] → on_success / on_failure
//!                                                          └─ failure → [RetryPolicy::backoff] → next attempt
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use retry::{RetryConfig, RetryPolicy};
