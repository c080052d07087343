// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `simulation` completion provider (§6.3 `mode=llm|simulation|auto`):
//! a deterministic `TextCompletionPort` that recognizes each stage's prompt
//! shape by its distinctive phrasing and answers in that stage's labeled-line
//! convention, so the whole pipeline can be exercised end to end with no
//! external model configured.

use archon_types::{CompletionError, TextCompletionPort};
use async_trait::async_trait;

pub struct SimulationCompletion;

#[async_trait]
impl TextCompletionPort for SimulationCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let text = if prompt.contains("as President of") {
            "FR: deliver the mandated outcome\n\
             NFR: respond within agreed latency budgets\n\
             C: stay within the ratified budget envelope\n\
             D: a working deployment demonstrating the outcome\n\
             EC: an independent smoke test passes\n"
                .to_string()
        } else if prompt.contains("Secretary-Text: consolidate") {
            prompt
                .rsplit_once(":\n")
                .map(|(_, body)| body.trim().to_string())
                .unwrap_or_default()
        } else if prompt.contains("Panel facilitator") {
            simulate_panel(prompt)
        } else if prompt.contains("score the proposal") {
            "DIM: feasibility=7\nDIM: completeness=7\nDIM: risk_mitigation=6\n\
             DIM: resource_efficiency=6\nDIM: innovation=6\nDIM: alignment=7\n\
             OVERALL: 7.0\nCONFIDENCE: 0.7\nNOVELTY: 0.4\n\
             REASON: a workable plan with acceptable coverage\n\
             STRENGTH: clear tactics\nWEAKNESS: thin resourcing detail\n"
                .to_string()
        } else if prompt.contains("propose tactics") {
            "T: stand up the primary workflow\n\
             R: dependency on an external provider\n\
             RR: two engineers for one sprint\n"
                .to_string()
        } else if prompt.contains("map every requirement") {
            "COVERAGE: FR-001 -> T-001 (0.80)\n\
             PLAN: ship incrementally behind a flag\n\
             CAPACITY: one squad, one quarter\n\
             ASSUMPTION: upstream API stays stable\n\
             CONSTRAINT: must not exceed the ratified budget\n"
                .to_string()
        } else if prompt.contains("state your overview") {
            "A pragmatic plan grounded in the mandate's stated outcomes, favoring incremental delivery.".to_string()
        } else if prompt.contains("give a one-paragraph executive summary") {
            "This proposal delivers the mandate's outcomes through staged, reviewable increments.".to_string()
        } else if prompt.contains("propose TaskDrafts") || prompt.contains("Synthesize the final unified set") {
            "TASK: implement the core workflow | OUTCOMES: workflow runs end to end | \
             TAGS: dev_backend | EFFORT: 8 | DELIVERABLE: - | REQ: FR-001\n"
                .to_string()
        } else {
            String::new()
        };
        Ok(text)
    }
}

/// The selection panel prompt lists each finalist as `"<duke_id> (aggregated
/// mean N.NN)"`, one per line. The simulated panel votes for the first one
/// listed (highest aggregated mean, since `run` sorts before building the
/// panel summary) at its reported mean.
fn simulate_panel(prompt: &str) -> String {
    let first_line = prompt.lines().find(|line| line.contains("(aggregated mean"));
    match first_line.and_then(|line| line.split_once(" (aggregated mean ")) {
        Some((duke_id, rest)) => {
            let mean = rest.trim_end_matches(['.', ')']).trim_end_matches(')');
            format!("VOTE: president -> {duke_id} ({mean})\nWINNER: {duke_id}\n")
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recognizes_a_president_prompt() {
        let text = SimulationCompletion.complete("as President of HEALTH, state...").await.unwrap();
        assert!(text.contains("FR:"));
    }

    #[tokio::test]
    async fn panel_votes_for_the_first_listed_finalist() {
        let prompt = "Panel facilitator: the top proposals are:\nSYSTEM:duke-a (aggregated mean 8.10)\nSYSTEM:duke-b (aggregated mean 6.50)\nRecord...";
        let text = simulate_panel(prompt);
        assert!(text.contains("WINNER: SYSTEM:duke-a"));
    }
}
