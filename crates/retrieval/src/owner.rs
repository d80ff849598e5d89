use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves the owner id stored with a chunk to a display name.
///
/// Chunks whose owner cannot be resolved are left out of the answer context.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn resolve(&self, owner: &str) -> Option<String>;
}

/// Fixed owner table
#[derive(Debug, Clone, Default)]
pub struct StaticOwnerDirectory {
    owners: HashMap<String, String>,
}

impl StaticOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_owner(mut self, id: impl Into<String>, display: impl Into<String>) -> Self {
        self.owners.insert(id.into(), display.into());
        self
    }
}

#[async_trait]
impl OwnerDirectory for StaticOwnerDirectory {
    async fn resolve(&self, owner: &str) -> Option<String> {
        self.owners.get(owner).cloned()
    }
}
