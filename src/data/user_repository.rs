use crate::domain::error::DomainError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{NewUser, User};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace, warn};

const DUPLICATE_EMAIL: &str = "user with this email already exists.";

#[derive(Clone)]
pub struct InMemoryUserRepository {
    storage: Arc<RwLock<HashMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: NewUser) -> Result<User> {
        trace!("Acquiring write lock for user storage");
        let mut storage = self.storage.write().await;
        if storage.values().any(|u| u.email == user.email) {
            warn!(email = %user.email, "Email already registered");
            return Err(DomainError::field("email", DUPLICATE_EMAIL).into());
        }

        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            date_joined: Utc::now(),
        };
        storage.insert(user.id, user.clone());
        debug!(user_id = user.id, email = %user.email, "User saved to memory storage");
        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: User) -> Result<()> {
        let mut storage = self.storage.write().await;
        if !storage.contains_key(&user.id) {
            return Err(DomainError::NotFound(format!("User {}", user.id)).into());
        }
        if storage
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            warn!(email = %user.email, "Email already registered to another user");
            return Err(DomainError::field("email", DUPLICATE_EMAIL).into());
        }
        storage.insert(user.id, user);
        debug!("User updated in memory storage");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        trace!("Acquiring read lock for user storage");
        let storage = self.storage.read().await;
        let user = storage.values().find(|u| u.email == email).cloned();
        match &user {
            Some(u) => debug!(user_id = u.id, "User found in storage"),
            None => trace!("User not found in storage"),
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        Ok(storage.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: u64) -> Result<bool> {
        let mut storage = self.storage.write().await;
        let removed = storage.remove(&id).is_some();
        debug!(removed, "User delete processed");
        Ok(removed)
    }
}
