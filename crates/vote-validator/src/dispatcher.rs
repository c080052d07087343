use crate::aggregator::ConsensusAggregator;
use crate::breaker::CircuitBreaker;
use archon_types::{Vote, VoteValidationDispatchPort};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("bus publish failed: {0}")]
    Broker(String),
}

/// The decoupling seam the circuit breaker watches: in production this
/// fronts the actual `pending-validation` broker topic. `InProcessBus`
/// below is the always-succeeding co-located default; tests substitute a
/// flaky implementation to exercise breaker-open fallback.
#[async_trait]
pub trait BusPublishPort: Send + Sync {
    async fn publish(&self, vote: Vote) -> Result<(), PublishError>;
}

/// Publishes by spawning the aggregator's validation round as a detached
/// task, mirroring the decoupled, asynchronous nature of a real bus publish
/// without requiring an actual broker process in this workspace.
pub struct InProcessBus {
    aggregator: Arc<ConsensusAggregator>,
}

impl InProcessBus {
    pub fn new(aggregator: Arc<ConsensusAggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl BusPublishPort for InProcessBus {
    async fn publish(&self, vote: Vote) -> Result<(), PublishError> {
        let aggregator = self.aggregator.clone();
        tokio::spawn(async move { aggregator.run_validation_round(vote).await });
        Ok(())
    }
}

/// Implements `archon_types::VoteValidationDispatchPort` for `deliberation`
/// (§4.6/§4.7 boundary): the normal path fans a cast vote out onto the bus
/// asynchronously; once the breaker trips, `dispatch_for_validation` runs
/// the validation round synchronously in-process instead, bypassing the
/// (assumed-unhealthy) bus entirely until it recovers.
pub struct ValidationDispatcher {
    bus: Arc<dyn BusPublishPort>,
    aggregator: Arc<ConsensusAggregator>,
    breaker: Mutex<CircuitBreaker>,
}

impl ValidationDispatcher {
    pub fn new(
        bus: Arc<dyn BusPublishPort>,
        aggregator: Arc<ConsensusAggregator>,
        failure_threshold: u32,
        window: ChronoDuration,
        reset_timeout: ChronoDuration,
    ) -> Self {
        Self {
            bus,
            aggregator,
            breaker: Mutex::new(CircuitBreaker::new(failure_threshold, window, reset_timeout)),
        }
    }
}

#[async_trait]
impl VoteValidationDispatchPort for ValidationDispatcher {
    async fn dispatch_for_validation(&self, vote: &Vote) {
        let now = Utc::now();
        if self.breaker.lock().is_open(now) {
            tracing::warn!(vote_id = %vote.vote_id, "circuit open, validating synchronously in-process");
            self.aggregator.run_validation_round(vote.clone()).await;
            return;
        }

        match self.bus.publish(vote.clone()).await {
            Ok(()) => self.breaker.lock().record_success(),
            Err(err) => {
                tracing::warn!(vote_id = %vote.vote_id, error = %err, "bus publish failed, falling back synchronously");
                self.breaker.lock().record_failure(now);
                self.aggregator.run_validation_round(vote.clone()).await;
            }
        }
    }
}
