use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// §4.8's labeled-line convention for parsing structured items out of an
/// archon's free-text completion, one line per item: `LABEL: content`. Used
/// by RFP contributions (`FR:`/`NFR:`/`C:`/`D:`/`EC:`) and reused for Duke
/// Phase 2's header-per-item style (`### T-`/`### R-`/`### RR-` becomes
/// `T:`/`R:`/`RR:` once the completion is asked to tag its own sections).
pub fn extract_labeled_lines(text: &str, label: &str) -> Vec<String> {
    static LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*([A-Za-z]+):\s*(.+?)\s*$").unwrap());
    LINE.captures_iter(text)
        .filter(|caps| caps[1].eq_ignore_ascii_case(label))
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Splits a completion into every labeled section at once, grouping by
/// label (case-preserved as first seen). Used by Duke Phase 2 assembly,
/// which re-sorts per-Duke phase output into global Tactics/Risks/
/// ResourceRequests sections (§4.8).
pub fn extract_all_labeled_lines(text: &str) -> HashMap<String, Vec<String>> {
    static LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*([A-Za-z]+):\s*(.+?)\s*$").unwrap());
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for caps in LINE.captures_iter(text) {
        grouped.entry(caps[1].to_uppercase()).or_default().push(caps[2].to_string());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_only_the_requested_label() {
        let text = "FR: ingest events\nNFR: p99 under 200ms\nFR: expose a read API\n";
        assert_eq!(extract_labeled_lines(text, "FR"), vec!["ingest events", "expose a read API"]);
        assert_eq!(extract_labeled_lines(text, "NFR"), vec!["p99 under 200ms"]);
    }

    #[test]
    fn grouping_collects_every_label_present() {
        let text = "T: stand up the worker\nR: vendor API rate limits\nRR: two backend engineers\n";
        let grouped = extract_all_labeled_lines(text);
        assert_eq!(grouped.get("T").unwrap(), &vec!["stand up the worker".to_string()]);
        assert_eq!(grouped.get("R").unwrap(), &vec!["vendor API rate limits".to_string()]);
        assert_eq!(grouped.get("RR").unwrap(), &vec!["two backend engineers".to_string()]);
    }

    #[test]
    fn text_with_no_labels_yields_nothing() {
        assert!(extract_labeled_lines("just prose, no labels here.", "FR").is_empty());
    }
}
