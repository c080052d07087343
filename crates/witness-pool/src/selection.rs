use archon_types::{AgentId, ContentHash};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Open Question #2 (resolved in `SPEC_FULL.md` §16): the verifiable-random
/// seed is chain-internal and needs no external oracle. `recent_selections`
/// are the `content_hash`es of the two most recent `WitnessSelected`
/// sub-events; any observer holding the event stream can recompute this.
pub fn compute_seed(prev_hash: ContentHash, recent_selections: &[ContentHash]) -> ContentHash {
    let beacon = recent_selections
        .iter()
        .take(2)
        .fold(ContentHash::genesis_anchor(), |acc, h| acc.xor(*h));
    prev_hash.xor(beacon)
}

fn score(seed: ContentHash, witness: &AgentId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.0);
    hasher.update(witness.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("witness pool exhausted: need {needed}, only {available} eligible after cooldown exclusion")]
    PoolExhausted { needed: usize, available: usize },
}

/// Deterministic, reproducible selection (§4.5 step 1-2): any observer with
/// the same `seed` and `active_pool` recomputes the same result.
pub fn select_witnesses(
    seed: ContentHash,
    active_pool: &[AgentId],
    cooldown_excluded: &HashSet<AgentId>,
    min_count: usize,
) -> Result<Vec<AgentId>, SelectionError> {
    let mut eligible: Vec<&AgentId> = active_pool
        .iter()
        .filter(|w| !cooldown_excluded.contains(*w))
        .collect();

    if eligible.len() < min_count {
        return Err(SelectionError::PoolExhausted {
            needed: min_count,
            available: eligible.len(),
        });
    }

    eligible.sort_by(|a, b| score(seed, b).cmp(&score(seed, a)));
    Ok(eligible.into_iter().take(min_count).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentId {
        AgentId::agent(uuid::Uuid::new_v4())
    }

    #[test]
    fn selection_is_deterministic_given_same_seed_and_pool() {
        let pool: Vec<AgentId> = (0..10).map(|_| agent()).collect();
        let seed = ContentHash::genesis_anchor();
        let a = select_witnesses(seed, &pool, &HashSet::new(), 3).unwrap();
        let b = select_witnesses(seed, &pool, &HashSet::new(), 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn exhausted_pool_errors_rather_than_lowering_floor() {
        let pool: Vec<AgentId> = (0..2).map(|_| agent()).collect();
        let seed = ContentHash::genesis_anchor();
        let result = select_witnesses(seed, &pool, &HashSet::new(), 3);
        assert!(matches!(result, Err(SelectionError::PoolExhausted { .. })));
    }

    #[test]
    fn cooldown_excludes_recently_used_witnesses() {
        let pool: Vec<AgentId> = (0..5).map(|_| agent()).collect();
        let seed = ContentHash::genesis_anchor();
        let mut excluded = HashSet::new();
        excluded.insert(pool[0].clone());
        excluded.insert(pool[1].clone());
        let selected = select_witnesses(seed, &pool, &excluded, 2).unwrap();
        assert!(!selected.contains(&pool[0]));
        assert!(!selected.contains(&pool[1]));
    }
}
