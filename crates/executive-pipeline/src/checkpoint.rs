use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-stage, per-agent checkpointing (§4.8): each LLM call's output is
/// persisted before a stage proceeds. Resumption reads checkpoints and skips
/// completed work; `clear` invalidates a whole stage's checkpoints so it
/// re-runs from scratch.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, stage: &str, unit: &str) -> Option<serde_json::Value>;
    async fn save(&self, stage: &str, unit: &str, value: serde_json::Value);
    async fn clear(&self, stage: &str);
}

/// Process-local checkpointing for tests and single-process deployments. A
/// durable deployment backs this with one file/row per `(stage, unit)`
/// rather than an in-memory map, behind the same trait.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, stage: &str, unit: &str) -> Option<serde_json::Value> {
        self.entries.lock().get(&(stage.to_string(), unit.to_string())).cloned()
    }

    async fn save(&self, stage: &str, unit: &str, value: serde_json::Value) {
        self.entries.lock().insert((stage.to_string(), unit.to_string()), value);
    }

    async fn clear(&self, stage: &str) {
        self.entries.lock().retain(|(s, _), _| s != stage);
    }
}

/// File-backed checkpointing (§6.3 `--checkpoint-dir`, §9 "the program
/// counter is the set of files on disk"): one canonical-JSON file per
/// `(stage, unit)`, under `<root>/<stage>/<unit>.json`. Unit names come from
/// `AgentId`/`CounterId` `Display` output, which is filesystem-safe
/// already (no path separators); this store does not sanitize beyond that.
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn stage_dir(&self, stage: &str) -> PathBuf {
        self.root.join(stage)
    }

    fn unit_path(&self, stage: &str, unit: &str) -> PathBuf {
        self.stage_dir(stage).join(format!("{unit}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, stage: &str, unit: &str) -> Option<serde_json::Value> {
        let path = self.unit_path(stage, unit);
        let bytes = tokio::fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn save(&self, stage: &str, unit: &str, value: serde_json::Value) {
        let dir = self.stage_dir(stage);
        if let Err(error) = tokio::fs::create_dir_all(&dir).await {
            tracing::error!(stage, unit, %error, "failed to create checkpoint directory");
            return;
        }
        let bytes = match archon_types::canonical_json::to_canonical_bytes(&value) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(stage, unit, %error, "failed to canonicalize checkpoint payload");
                return;
            }
        };
        let path = self.unit_path(stage, unit);
        if let Err(error) = tokio::fs::write(&path, bytes).await {
            tracing::error!(stage, unit, %error, "failed to write checkpoint file");
        }
    }

    async fn clear(&self, stage: &str) {
        let dir = self.stage_dir(stage);
        if let Err(error) = tokio::fs::remove_dir_all(&dir).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(stage, %error, "failed to clear checkpoint directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resumption_skips_a_checkpointed_unit() {
        let store = InMemoryCheckpointStore::new();
        store.save("rfp", "president-health", serde_json::json!({"text": "done"})).await;
        assert_eq!(
            store.load("rfp", "president-health").await,
            Some(serde_json::json!({"text": "done"}))
        );
        assert_eq!(store.load("rfp", "president-other").await, None);
    }

    #[tokio::test]
    async fn clear_invalidates_only_the_named_stage() {
        let store = InMemoryCheckpointStore::new();
        store.save("rfp", "president-health", serde_json::json!({})).await;
        store.save("duke_proposal", "duke-infra", serde_json::json!({})).await;
        store.clear("rfp").await;
        assert_eq!(store.load("rfp", "president-health").await, None);
        assert!(store.load("duke_proposal", "duke-infra").await.is_some());
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("archon72-checkpoint-test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn file_store_round_trips_a_saved_value() {
        let root = scratch_dir();
        let store = FileCheckpointStore::new(root.clone());
        store.save("rfp", "president-health", serde_json::json!({"text": "done"})).await;
        assert_eq!(
            store.load("rfp", "president-health").await,
            Some(serde_json::json!({"text": "done"}))
        );
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn file_store_survives_a_fresh_handle_over_the_same_root() {
        let root = scratch_dir();
        {
            let store = FileCheckpointStore::new(root.clone());
            store.save("decomposition", "t-gusi-001-earl-0", serde_json::json!(["TASK: a"])).await;
        }
        let reopened = FileCheckpointStore::new(root.clone());
        assert_eq!(
            reopened.load("decomposition", "t-gusi-001-earl-0").await,
            Some(serde_json::json!(["TASK: a"]))
        );
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn file_store_clear_removes_only_the_named_stage() {
        let root = scratch_dir();
        let store = FileCheckpointStore::new(root.clone());
        store.save("rfp", "president-health", serde_json::json!({})).await;
        store.save("selection", "president-health-duke-a", serde_json::json!({})).await;
        store.clear("rfp").await;
        assert_eq!(store.load("rfp", "president-health").await, None);
        assert!(store.load("selection", "president-health-duke-a").await.is_some());
        let _ = std::fs::remove_dir_all(root);
    }
}
