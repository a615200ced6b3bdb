/// Resilience primitives for read-mostly store clients
///
/// Every call an aggregation request makes against a backing store is bounded and
/// observable. This library provides the building blocks:
/// - **Deadline**: a hard upper bound on a single store call
/// - **Retry**: exponential backoff for idempotent reads only
/// - **Circuit Breaker**: fail fast while a store is known to be down
/// - **Presets**: tuned bundles for the score index and the content index
///
/// # Example: guarded read
///
/// ```rust,no_run
/// use resilience::{deadline::with_deadline, presets};
///
/// #[tokio::main]
/// async fn main() {
///     let policy = presets::score_index();
///     let result = with_deadline(policy.deadline, async {
///         // one read against the store
///         42
///     })
///     .await;
///     assert!(result.is_ok());
/// }
/// ```

pub mod breaker;
pub mod deadline;
pub mod presets;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
pub use deadline::{with_deadline, DeadlineExceeded};
pub use presets::{content_index, score_index, GuardPolicy};
pub use retry::{retry_idempotent, RetryPolicy};
