use archon_types::CounterId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// §4.8 counter monotonicity: `T-{ABBR}-NNN`/`R-{ABBR}-NNN`/`RR-{ABBR}-NNN`
/// style identifiers are allocated monotonically per producer. On resume,
/// allocator state is reconstructed by scanning the highest seen suffix per
/// `(prefix, abbr)` rather than trusting a persisted counter value.
#[derive(Default)]
pub struct CounterAllocator {
    highest: Mutex<HashMap<(String, String), u32>>,
}

fn parse_suffix(id: &CounterId) -> Option<(String, String, u32)> {
    let parts: Vec<&str> = id.0.splitn(3, '-').collect();
    if parts.len() != 3 {
        return None;
    }
    let n: u32 = parts[2].parse().ok()?;
    Some((parts[0].to_string(), parts[1].to_string(), n))
}

impl CounterAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds allocator state from every `CounterId` already observed in
    /// the persisted record (resumption path).
    pub fn reconstruct(observed: impl IntoIterator<Item = CounterId>) -> Self {
        let allocator = Self::new();
        for id in observed {
            allocator.observe(&id);
        }
        allocator
    }

    pub fn observe(&self, id: &CounterId) {
        if let Some((prefix, abbr, n)) = parse_suffix(id) {
            let mut highest = self.highest.lock();
            let entry = highest.entry((prefix, abbr)).or_insert(0);
            *entry = (*entry).max(n);
        }
    }

    /// Allocates the next identifier for `(prefix, abbr)`, starting at 1.
    pub fn next(&self, prefix: &str, abbr: &str) -> CounterId {
        let mut highest = self.highest.lock();
        let entry = highest.entry((prefix.to_string(), abbr.to_string())).or_insert(0);
        *entry += 1;
        CounterId::new(prefix, abbr, *entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_within_a_prefix_and_abbr() {
        let allocator = CounterAllocator::new();
        assert_eq!(allocator.next("T", "GUSI"), CounterId::new("T", "GUSI", 1));
        assert_eq!(allocator.next("T", "GUSI"), CounterId::new("T", "GUSI", 2));
        assert_eq!(allocator.next("R", "GUSI"), CounterId::new("R", "GUSI", 1));
    }

    #[test]
    fn reconstruction_resumes_after_the_highest_observed_suffix() {
        let observed = vec![CounterId::new("T", "GUSI", 1), CounterId::new("T", "GUSI", 3)];
        let allocator = CounterAllocator::reconstruct(observed);
        assert_eq!(allocator.next("T", "GUSI"), CounterId::new("T", "GUSI", 4));
    }
}
