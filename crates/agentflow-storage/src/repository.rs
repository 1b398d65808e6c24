//! Memory repository trait

use async_trait::async_trait;

use agentflow_models::Memory;

use crate::Result;

/// Persistence boundary for agent memories, keyed by `(agent_id, role)`.
///
/// `save` must be atomic with respect to a given memory: concurrent
/// readers observe either the previous snapshot or the new one, never a
/// partially written list.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Load the memory for an agent/role pair. Absent memories come back
    /// empty, not as an error.
    async fn get(&self, agent_id: &str, role: &str) -> Result<Memory>;

    /// Persist the memory for an agent/role pair, replacing any previous
    /// snapshot.
    async fn save(&self, agent_id: &str, role: &str, memory: &Memory) -> Result<()>;
}
