//! Prometheus shortcuts (§15): the standing count of power leases that have
//! been issued but not yet settled, the signal spec.md §5 names as an
//! operational backpressure indicator for the task-activation boundary.

use once_cell::sync::Lazy;
use prometheus::{register_int_gauge, IntGauge};

pub static OPEN_POWER_LEASES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "archon_task_activation_open_power_leases",
        "Power leases issued at activation that have not yet reached a terminal task state"
    )
    .expect("metric registration is infallible outside of name collisions")
});
