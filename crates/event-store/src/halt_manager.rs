use crate::halt_channel::HaltChannel;
use archon_types::{AgentId, CessationFlag, HaltState};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// §4.3: a halt may not be cleared within this long of its most recent
/// trigger. A fresh halt raised inside the window resets the clock.
pub const QUIET_PERIOD: Duration = Duration::hours(48);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HaltError {
    #[error("cessation has been executed; the process cannot resume")]
    CessationIrreversible,
    #[error("no halt is currently open")]
    NotHalted,
}

/// Owns the dual halt channels and the cessation flag (I8: `cessation`
/// transitions false → true exactly once and is never cleared).
pub struct HaltCessationManager {
    primary: Arc<dyn HaltChannel>,
    secondary: Arc<dyn HaltChannel>,
    cessation: RwLock<CessationFlag>,
    /// §4.3's post-clear quiet window: `Some(until)` once a `HaltCleared` has
    /// been written, cleared back to `None` by the next `trigger_halt` (so a
    /// fresh halt during the window resets the clock rather than shortening
    /// it). This gates *full-throughput* resumption, never the clear itself.
    quiet_until: RwLock<Option<DateTime<Utc>>>,
}

impl HaltCessationManager {
    pub fn new(primary: Arc<dyn HaltChannel>, secondary: Arc<dyn HaltChannel>) -> Self {
        Self {
            primary,
            secondary,
            cessation: RwLock::new(CessationFlag::default()),
            quiet_until: RwLock::new(None),
        }
    }

    pub fn is_cessated(&self) -> bool {
        self.cessation.read().cessation_executed
    }

    /// CT-11: the two channels disagreeing is itself treated as halted, even
    /// if neither channel's own `is_halted` flag says so.
    pub async fn effective_state(&self) -> HaltState {
        let primary = self.primary.read().await;
        let secondary = self.secondary.read().await;
        if primary.is_halted == secondary.is_halted && primary.triggered_at == secondary.triggered_at {
            HaltState {
                channel_consensus: true,
                ..primary
            }
        } else {
            HaltState {
                is_halted: true,
                channel_consensus: false,
                ..primary
            }
        }
    }

    pub async fn is_effectively_halted(&self) -> bool {
        self.effective_state().await.is_effectively_halted()
    }

    pub async fn trigger_halt(
        &self,
        reason: impl Into<String>,
        triggered_by: AgentId,
        now: DateTime<Utc>,
    ) -> Result<(), HaltError> {
        if self.is_cessated() {
            return Err(HaltError::CessationIrreversible);
        }
        let state = HaltState {
            is_halted: true,
            reason: Some(reason.into()),
            triggered_at: Some(now),
            triggered_by: Some(triggered_by),
            cleared_at: None,
            cleared_by: None,
            channel_consensus: true,
        };
        self.primary.write(state.clone()).await;
        self.secondary.write(state).await;
        *self.quiet_until.write() = None;
        Ok(())
    }

    /// §4.3: clearing opens the 48h quiet period, it is never gated by one.
    /// A `HaltCleared` write succeeds as soon as an authorized party calls
    /// this while a halt is open; `is_in_quiet_period` is what callers
    /// consult afterward to decide whether full-throughput operation may
    /// resume yet.
    pub async fn clear_halt(&self, cleared_by: AgentId, now: DateTime<Utc>) -> Result<(), HaltError> {
        if self.is_cessated() {
            return Err(HaltError::CessationIrreversible);
        }
        let current = self.effective_state().await;
        if !current.is_effectively_halted() {
            return Err(HaltError::NotHalted);
        }
        let state = HaltState {
            is_halted: false,
            reason: current.reason,
            triggered_at: current.triggered_at,
            triggered_by: current.triggered_by,
            cleared_at: Some(now),
            cleared_by: Some(cleared_by),
            channel_consensus: true,
        };
        self.primary.write(state.clone()).await;
        self.secondary.write(state).await;
        *self.quiet_until.write() = Some(now + QUIET_PERIOD);
        Ok(())
    }

    /// Whether full-throughput operation is still withheld under §4.3's
    /// post-clear quiet period. `false` once no clear has happened yet (a
    /// halt that was never cleared) or once the window has elapsed.
    pub fn is_in_quiet_period(&self, now: DateTime<Utc>) -> bool {
        match *self.quiet_until.read() {
            Some(until) => now < until,
            None => false,
        }
    }

    /// One-way: once flipped, `trigger_halt`/`clear_halt` both refuse.
    pub fn execute_cessation(&self) {
        self.cessation.write().cessation_executed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halt_channel::InMemoryHaltChannel;

    fn agent() -> AgentId {
        AgentId::agent(uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn disagreement_between_channels_is_treated_as_halted() {
        let primary = Arc::new(InMemoryHaltChannel::default());
        let secondary = Arc::new(InMemoryHaltChannel::default());
        let manager = HaltCessationManager::new(primary.clone(), secondary);
        assert!(!manager.is_effectively_halted().await);

        primary
            .write(HaltState {
                is_halted: true,
                reason: Some("x".into()),
                triggered_at: Some(Utc::now()),
                triggered_by: Some(agent()),
                cleared_at: None,
                cleared_by: None,
                channel_consensus: true,
            })
            .await;
        assert!(manager.is_effectively_halted().await);
    }

    #[tokio::test]
    async fn clear_succeeds_immediately_but_opens_a_quiet_period() {
        let primary = Arc::new(InMemoryHaltChannel::default());
        let secondary = Arc::new(InMemoryHaltChannel::default());
        let manager = HaltCessationManager::new(primary, secondary);
        let now = Utc::now();
        manager.trigger_halt("breach", agent(), now).await.unwrap();

        let clear_time = now + Duration::hours(1);
        manager.clear_halt(agent(), clear_time).await.unwrap();
        assert!(!manager.is_effectively_halted().await);

        assert!(manager.is_in_quiet_period(clear_time));
        assert!(manager.is_in_quiet_period(clear_time + Duration::hours(47)));
        assert!(!manager.is_in_quiet_period(clear_time + QUIET_PERIOD));
    }

    #[tokio::test]
    async fn new_halt_during_quiet_period_resets_the_timer() {
        let primary = Arc::new(InMemoryHaltChannel::default());
        let secondary = Arc::new(InMemoryHaltChannel::default());
        let manager = HaltCessationManager::new(primary, secondary);
        let t0 = Utc::now();
        manager.trigger_halt("breach-1", agent(), t0).await.unwrap();
        manager.clear_halt(agent(), t0 + Duration::hours(10)).await.unwrap();
        assert!(manager.is_in_quiet_period(t0 + Duration::hours(20)));

        // A fresh halt inside the quiet window clears it until the next clear.
        let t1 = t0 + Duration::hours(20);
        manager.trigger_halt("breach-2", agent(), t1).await.unwrap();
        assert!(!manager.is_in_quiet_period(t1));

        manager.clear_halt(agent(), t1 + Duration::hours(5)).await.unwrap();
        assert!(manager.is_in_quiet_period(t1 + Duration::hours(5)));
        assert!(!manager.is_in_quiet_period(t1 + Duration::hours(5) + QUIET_PERIOD));
    }

    #[tokio::test]
    async fn cessation_is_irreversible() {
        let primary = Arc::new(InMemoryHaltChannel::default());
        let secondary = Arc::new(InMemoryHaltChannel::default());
        let manager = HaltCessationManager::new(primary, secondary);
        manager.execute_cessation();
        assert_eq!(
            manager.trigger_halt("x", agent(), Utc::now()).await,
            Err(HaltError::CessationIrreversible)
        );
    }
}
