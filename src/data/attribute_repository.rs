use crate::domain::error::DomainError;
use crate::domain::recipe::{Attribute, AttributeKind};
use crate::domain::repository::AttributeRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Storage for one attribute kind; tags and ingredients get separate instances.
#[derive(Clone)]
pub struct InMemoryAttributeRepository {
    kind: AttributeKind,
    storage: Arc<RwLock<HashMap<u64, Attribute>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryAttributeRepository {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[async_trait]
impl AttributeRepository for InMemoryAttributeRepository {
    fn kind(&self) -> AttributeKind {
        self.kind
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn create(&self, user_id: u64, name: String) -> Result<Attribute> {
        let attribute = Attribute {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name,
            user_id,
        };
        self.storage
            .write()
            .await
            .insert(attribute.id, attribute.clone());
        debug!(id = attribute.id, "Attribute saved to memory storage");
        Ok(attribute)
    }

    #[instrument(skip(self, attribute), fields(kind = %self.kind, id = attribute.id))]
    async fn update(&self, attribute: Attribute) -> Result<()> {
        let mut storage = self.storage.write().await;
        match storage.get_mut(&attribute.id) {
            Some(slot) => {
                *slot = attribute;
                Ok(())
            }
            None => Err(DomainError::NotFound(format!("{} {}", self.kind, attribute.id)).into()),
        }
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Attribute>> {
        Ok(self.storage.read().await.get(&id).cloned())
    }

    async fn list_for_owner(&self, user_id: u64) -> Result<Vec<Attribute>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.storage.write().await.remove(&id).is_some())
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn delete_for_owner(&self, user_id: u64) -> Result<usize> {
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, a| a.user_id != user_id);
        let removed = before - storage.len();
        debug!(removed, "Owner attributes removed");
        Ok(removed)
    }
}
