//! Prometheus shortcuts (§15), following `aptos-metrics-core`'s
//! register-once-behind-a-`Lazy` convention: call sites reach for these
//! statics rather than threading a `Registry` through the writer.

use once_cell::sync::Lazy;
use prometheus::{register_histogram, Histogram};

/// Wall-clock time spent inside `WitnessedEventWriter::append`, from the
/// halt/cessation gate through the store's atomic commit. Matches §5's
/// "consumer lag is a monitored metric" framing one layer up: this is the
/// producer-side counterpart for the append path itself.
pub static APPEND_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "archon_event_store_append_latency_seconds",
        "Time to append a witnessed event, including witness attestation collection"
    )
    .expect("metric registration is infallible outside of name collisions")
});
