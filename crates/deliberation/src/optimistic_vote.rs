use archon_types::VoteChoice;
use once_cell::sync::Lazy;
use regex::Regex;

static AYE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(aye|yea|yes|support|favou?r|approve)\b").unwrap());
static NAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(nay|no|oppose|against|reject)\b").unwrap());

/// §4.6 step 3: the optimistic regex parse. Defaults to `Abstain` whenever
/// the text is silent, contradictory, or names abstention outright — the
/// async validator (§4.7) is the authority on a vote's true meaning, this is
/// only a fast, unvalidated first guess.
pub fn parse_optimistic_choice(raw_text: &str) -> VoteChoice {
    let aye = AYE_PATTERN.is_match(raw_text);
    let nay = NAY_PATTERN.is_match(raw_text);
    match (aye, nay) {
        (true, false) => VoteChoice::Aye,
        (false, true) => VoteChoice::Nay,
        _ => VoteChoice::Abstain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_an_aye() {
        assert_eq!(parse_optimistic_choice("I vote aye on this motion."), VoteChoice::Aye);
        assert_eq!(parse_optimistic_choice("Yes, I support it."), VoteChoice::Aye);
    }

    #[test]
    fn recognizes_a_nay() {
        assert_eq!(parse_optimistic_choice("I must vote nay."), VoteChoice::Nay);
        assert_eq!(parse_optimistic_choice("I am against this."), VoteChoice::Nay);
    }

    #[test]
    fn defaults_to_abstain_on_silence() {
        assert_eq!(parse_optimistic_choice("I have thoughts about the weather."), VoteChoice::Abstain);
    }

    #[test]
    fn defaults_to_abstain_on_contradiction() {
        assert_eq!(
            parse_optimistic_choice("Part of me says aye, part of me says nay."),
            VoteChoice::Abstain
        );
    }

    #[test]
    fn explicit_abstain_falls_through_to_abstain() {
        assert_eq!(parse_optimistic_choice("I abstain."), VoteChoice::Abstain);
    }
}
