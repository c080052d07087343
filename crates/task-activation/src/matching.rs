use crate::cluster::{Cluster, ClusterId, ClusterStatus};
use archon_types::AuthLevel;
use std::collections::BTreeSet;

/// §4.9's four deterministic matching rules, applied in order, plus the
/// cluster's own consent-policy compliance (a structural precondition of
/// what counts as a matchable cluster at all, not one of the four rules).
/// Results are sorted by `cluster_id` for determinism and the first `top_k`
/// are returned.
pub fn match_clusters(
    clusters: &[Cluster],
    required_tags: &[String],
    sensitivity_gate: AuthLevel,
    top_k: usize,
) -> Vec<ClusterId> {
    let required: BTreeSet<&str> = required_tags.iter().map(String::as_str).collect();

    let mut matched: Vec<&Cluster> = clusters
        .iter()
        .filter(|c| c.consent_policy.compliant())
        .filter(|c| c.status == ClusterStatus::Active)
        .filter(|c| c.availability_status != crate::cluster::AvailabilityStatus::Unavailable)
        .filter(|c| {
            let offered: BTreeSet<&str> = c.capability_tags.iter().map(String::as_str).collect();
            required.is_subset(&offered)
        })
        .filter(|c| c.steward_auth_level >= sensitivity_gate)
        .collect();

    matched.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
    matched.into_iter().take(top_k).map(|c| c.cluster_id.clone()).collect()
}

/// §4.10 rerouting: the same matching rules, with clusters that have
/// already been tried for this task excluded up front.
pub fn match_clusters_excluding(
    clusters: &[Cluster],
    required_tags: &[String],
    sensitivity_gate: AuthLevel,
    top_k: usize,
    excluded: &BTreeSet<ClusterId>,
) -> Vec<ClusterId> {
    let remaining: Vec<Cluster> = clusters
        .iter()
        .filter(|c| !excluded.contains(&c.cluster_id))
        .cloned()
        .collect();
    match_clusters(&remaining, required_tags, sensitivity_gate, top_k)
}
