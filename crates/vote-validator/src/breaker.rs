use chrono::{DateTime, Duration as ChronoDuration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Dispatcher-side circuit breaker (§4.7): opens once `failure_threshold`
/// bus-publish failures land inside a rolling `window`, then lets the
/// dispatcher fall back to synchronous in-process validation until
/// `reset_timeout` has elapsed, at which point the next call is tried
/// half-open.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    failure_threshold: u32,
    window: ChronoDuration,
    window_started_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    reset_timeout: ChronoDuration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, window: ChronoDuration, reset_timeout: ChronoDuration) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            failure_threshold,
            window,
            window_started_at: None,
            opened_at: None,
            reset_timeout,
        }
    }

    /// Half-open transition happens as a side effect of the check itself:
    /// once `reset_timeout` has passed since opening, the next caller is
    /// let through (and must report success/failure) rather than queuing
    /// behind a timer task.
    pub fn is_open(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != BreakerState::Open {
            return false;
        }
        match self.opened_at {
            Some(opened_at) if now >= opened_at + self.reset_timeout => {
                self.state = BreakerState::HalfOpen;
                false
            }
            _ => true,
        }
    }

    pub fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.window_started_at = None;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
            self.failure_count = self.failure_threshold;
            return;
        }
        match self.window_started_at {
            Some(start) if now - start <= self.window => self.failure_count += 1,
            _ => {
                self.window_started_at = Some(now);
                self.failure_count = 1;
            }
        }
        if self.failure_count >= self.failure_threshold {
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
        }
    }
}
