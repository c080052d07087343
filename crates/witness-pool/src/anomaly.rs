use archon_types::AgentId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum AnomalyWarning {
    /// A witness appeared in more than 20% of the recent window.
    Concentration { witness: AgentId, fraction: f64 },
    /// A pair of witnesses co-occurred above the configured threshold.
    PotentialCollusion { pair: (AgentId, AgentId), co_occurrences: usize },
    /// The active pool has fallen below the minimum viable size. This is a
    /// breach, not a warning (§4.5), surfaced distinctly by the caller.
    PoolBelowMinimumViable { pool_size: usize, minimum: usize },
}

const CONCENTRATION_THRESHOLD: f64 = 0.20;

/// Out-of-band anomaly detection (§4.5): scans a trailing window of
/// `WitnessSelected` sub-events. Never gates an append by itself — warnings
/// are recorded as events and feed breach escalation (§4.14), not halts.
pub struct AnomalyMonitor {
    window: Vec<Vec<AgentId>>,
    window_capacity: usize,
    pair_threshold: usize,
}

impl AnomalyMonitor {
    pub fn new(window_capacity: usize, pair_threshold: usize) -> Self {
        Self {
            window: Vec::new(),
            window_capacity,
            pair_threshold,
        }
    }

    pub fn record_selection(&mut self, selected: Vec<AgentId>) {
        self.window.push(selected);
        if self.window.len() > self.window_capacity {
            self.window.remove(0);
        }
    }

    pub fn scan(&self, active_pool_size: usize, minimum_viable_pool: usize) -> Vec<AnomalyWarning> {
        let mut warnings = Vec::new();

        if active_pool_size < minimum_viable_pool {
            warnings.push(AnomalyWarning::PoolBelowMinimumViable {
                pool_size: active_pool_size,
                minimum: minimum_viable_pool,
            });
        }

        if self.window.is_empty() {
            return warnings;
        }

        let total_events = self.window.len();
        let mut appearances: HashMap<AgentId, usize> = HashMap::new();
        let mut pair_counts: HashMap<(AgentId, AgentId), usize> = HashMap::new();

        for selection in &self.window {
            for witness in selection {
                *appearances.entry(witness.clone()).or_insert(0) += 1;
            }
            for i in 0..selection.len() {
                for j in (i + 1)..selection.len() {
                    let mut pair = (selection[i].clone(), selection[j].clone());
                    if pair.1 < pair.0 {
                        pair = (pair.1, pair.0);
                    }
                    *pair_counts.entry(pair).or_insert(0) += 1;
                }
            }
        }

        for (witness, count) in appearances {
            let fraction = count as f64 / total_events as f64;
            if fraction > CONCENTRATION_THRESHOLD {
                warnings.push(AnomalyWarning::Concentration { witness, fraction });
            }
        }

        for (pair, count) in pair_counts {
            if count > self.pair_threshold {
                warnings.push(AnomalyWarning::PotentialCollusion {
                    pair,
                    co_occurrences: count,
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentId {
        AgentId::agent(uuid::Uuid::new_v4())
    }

    #[test]
    fn flags_concentration_above_20_percent() {
        let mut monitor = AnomalyMonitor::new(10, 100);
        let hot_witness = agent();
        for _ in 0..5 {
            monitor.record_selection(vec![hot_witness.clone(), agent()]);
        }
        for _ in 0..5 {
            monitor.record_selection(vec![agent(), agent()]);
        }
        let warnings = monitor.scan(10, 3);
        assert!(warnings.iter().any(|w| matches!(
            w,
            AnomalyWarning::Concentration { witness, .. } if witness == &hot_witness
        )));
    }

    #[test]
    fn flags_pool_below_minimum_viable() {
        let monitor = AnomalyMonitor::new(10, 100);
        let warnings = monitor.scan(2, 3);
        assert!(warnings.contains(&AnomalyWarning::PoolBelowMinimumViable {
            pool_size: 2,
            minimum: 3
        }));
    }
}
