// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `llm` completion provider (§6.3 `mode=llm`): a generic HTTP adapter
//! treating the model as an opaque external collaborator. LLM inference
//! itself is out of scope (§1 Non-goals); this is the port integration, not
//! the model.

use archon_types::{CompletionError, TextCompletionPort};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Posts `{"prompt": "..."}` to `endpoint` and expects back `{"text": "..."}`.
/// No retry, auth, or streaming support — a caller with a richer provider
/// contract wraps its own `TextCompletionPort`, the same way this workspace
/// never hardcodes a single signing or witnessing backend behind its ports.
pub struct LlmCompletion {
    client: reqwest::Client,
    endpoint: String,
}

impl LlmCompletion {
    pub fn new(endpoint: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint }
    }
}

#[async_trait]
impl TextCompletionPort for LlmCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { prompt })
            .send()
            .await
            .map_err(|error| CompletionError::Provider(error.to_string()))?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|error| CompletionError::Provider(error.to_string()))?;
        Ok(body.text)
    }
}
