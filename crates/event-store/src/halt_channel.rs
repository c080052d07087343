use archon_types::HaltState;
use async_trait::async_trait;
use parking_lot::RwLock;

/// One of the two physically-independent signals read by
/// `HaltCessationManager` (§4.3, CT-11/CT-13). A production deployment backs
/// primary and secondary with different infrastructure (e.g. a database row
/// and a distributed lock service) so a single outage cannot both flip a
/// halt and hide the disagreement.
#[async_trait]
pub trait HaltChannel: Send + Sync {
    async fn read(&self) -> HaltState;
    async fn write(&self, state: HaltState);
}

pub struct InMemoryHaltChannel {
    state: RwLock<HaltState>,
}

impl Default for InMemoryHaltChannel {
    fn default() -> Self {
        Self {
            state: RwLock::new(HaltState::operational()),
        }
    }
}

#[async_trait]
impl HaltChannel for InMemoryHaltChannel {
    async fn read(&self) -> HaltState {
        self.state.read().clone()
    }

    async fn write(&self, state: HaltState) {
        *self.state.write() = state;
    }
}
