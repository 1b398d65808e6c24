//! Process-local memory repository

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use agentflow_models::Memory;

use crate::{MemoryRepository, Result, StorageError};

/// In-process repository backed by a `RwLock<HashMap>`.
///
/// Whole-memory replacement under the write lock gives the per-memory
/// atomicity the trait requires. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    entries: RwLock<HashMap<(String, String), Memory>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored memories (test helper).
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn get(&self, agent_id: &str, role: &str) -> Result<Memory> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))?;
        Ok(entries
            .get(&(agent_id.to_string(), role.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, agent_id: &str, role: &str, memory: &Memory) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))?;
        entries.insert((agent_id.to_string(), role.to_string()), memory.clone());
        tracing::trace!(agent_id, role, messages = memory.len(), "Memory saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_models::Message;

    #[tokio::test]
    async fn absent_memory_is_empty() {
        let repo = InMemoryRepository::new();
        let memory = repo.get("agent-1", "executor").await.unwrap();
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let repo = InMemoryRepository::new();
        let mut memory = Memory::new();
        memory.push(Message::system("P"));
        memory.push(Message::user("hi"));

        repo.save("agent-1", "executor", &memory).await.unwrap();
        let loaded = repo.get("agent-1", "executor").await.unwrap();
        assert_eq!(loaded, memory);
    }

    #[tokio::test]
    async fn memories_are_isolated_per_agent_and_role() {
        let repo = InMemoryRepository::new();
        let mut planner = Memory::new();
        planner.push(Message::system("planner prompt"));
        let mut executor = Memory::new();
        executor.push(Message::system("executor prompt"));

        repo.save("agent-1", "planner", &planner).await.unwrap();
        repo.save("agent-1", "executor", &executor).await.unwrap();

        assert_eq!(
            repo.get("agent-1", "planner").await.unwrap(),
            planner
        );
        assert_eq!(
            repo.get("agent-1", "executor").await.unwrap(),
            executor
        );
        assert!(repo.get("agent-2", "planner").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let repo = InMemoryRepository::new();
        let mut memory = Memory::new();
        memory.push(Message::user("v1"));
        repo.save("a", "executor", &memory).await.unwrap();

        memory.roll_back();
        memory.push(Message::user("v2"));
        repo.save("a", "executor", &memory).await.unwrap();

        let loaded = repo.get("a", "executor").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.messages()[0].content(), "v2");
    }
}
