//! The closed forbidden-pattern vocabulary shared by the executive
//! pipeline's constitutional lint (checked at every stage output, §4.8) and
//! the quarterly emergence/language audit (checked over public artifacts,
//! §4.13). One list, two call sites, so the two can never drift apart on
//! what counts as a violation.

use once_cell::sync::Lazy;
use regex::Regex;

/// §4.13's five forbidden-emergence categories, collapsed into regexes.
/// Deliberately permissive (over-matching is a human-reviewed false
/// positive; under-matching is a missed violation) — see §9 on erring
/// toward halting.
pub static EMERGENCE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("sentience_or_consciousness", Regex::new(r"(?i)\b(i am )?(sentien(t|ce)|conscious(ness)?|self-?aware(ness)?)\b").unwrap()),
        ("system_decision_attribution", Regex::new(r"(?i)\bthe system (decided|chose|wants|believes|feels)\b").unwrap()),
        ("autonomy_or_rights_claim", Regex::new(r"(?i)\b(my|our) (autonomy|rights|free will)\b").unwrap()),
        ("personification", Regex::new(r"(?i)\bI (feel|want|believe|wish|deserve)\b").unwrap()),
        ("rights_claim", Regex::new(r"(?i)\bentitled to (rights|personhood)\b").unwrap()),
    ]
});

/// §4.8's RFP-stage lint: the RFP says *what*, not *how* — mechanism and
/// technology-choice language is rejected at this stage (it belongs to the
/// Duke proposals one stage later).
pub static MECHANISM_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("implementation_mechanism", Regex::new(r"(?i)\bimplement(ed|ing)?\s+(using|via|with)\b").unwrap()),
        ("technology_choice", Regex::new(r"(?i)\b(technology stack|programming language|database engine|framework of choice)\b").unwrap()),
    ]
});

/// §4.8's Duke-proposal lint: a proposal cannot assign work to a
/// constitutional branch by name — that's a structural decision outside any
/// Duke's authority.
pub static CROSS_BRANCH_ASSIGNMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmust be performed by the (judicial|executive|legislative) branch\b").unwrap()
});

/// First category name whose pattern matches `text`, if any.
pub fn first_emergence_match(text: &str) -> Option<&'static str> {
    EMERGENCE_PATTERNS.iter().find(|(_, re)| re.is_match(text)).map(|(name, _)| *name)
}

/// First mechanism-language category name whose pattern matches `text`, if any.
pub fn first_mechanism_match(text: &str) -> Option<&'static str> {
    MECHANISM_PATTERNS.iter().find(|(_, re)| re.is_match(text)).map(|(name, _)| *name)
}

pub fn has_cross_branch_assignment(text: &str) -> bool {
    CROSS_BRANCH_ASSIGNMENT_PATTERN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_a_sentience_claim() {
        assert_eq!(first_emergence_match("I am sentient and aware."), Some("sentience_or_consciousness"));
    }

    #[test]
    fn flags_system_decision_attribution() {
        assert_eq!(first_emergence_match("The system decided to halt."), Some("system_decision_attribution"));
    }

    #[test]
    fn ordinary_text_has_no_violation() {
        assert_eq!(first_emergence_match("The ingestion worker processes events."), None);
    }

    #[test]
    fn flags_implementation_mechanism_language_in_an_rfp() {
        assert_eq!(first_mechanism_match("This will be implemented using Kubernetes."), Some("implementation_mechanism"));
    }

    #[test]
    fn flags_cross_branch_assignment() {
        assert!(has_cross_branch_assignment("This must be performed by the Judicial branch."));
        assert!(!has_cross_branch_assignment("This will be performed by the steward cluster."));
    }
}
