//! Prometheus shortcuts (§15): validator-bus backpressure signal for the
//! dispatcher's circuit breaker (§4.7, §5) and round-count visibility for
//! the consensus aggregator.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

/// Votes registered with the reconciliation gate across all active motions
/// that have not yet reached `validated` or `dlq_fallback`. This is the
/// "consumer lag" spec.md §5 asks the dispatcher's breaker to watch.
pub static PENDING_VALIDATIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "archon_vote_validator_pending_validations",
        "Votes awaiting validation or DLQ fallback across all active motions"
    )
    .expect("metric registration is infallible outside of name collisions")
});

/// Incremented once per `DlqFallback` event, independent of the witnessed
/// event itself — this is operational telemetry, never a substitute for it.
pub static DLQ_FALLBACKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "archon_vote_validator_dlq_fallbacks_total",
        "Votes that exhausted validator retries and fell back to the optimistic choice"
    )
    .expect("metric registration is infallible outside of name collisions")
});
