use crate::domain::recipe::{Attribute, AttributeKind, NewRecipe, Recipe};
use crate::domain::user::{NewUser, User};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with a field error on `email` when the address is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, user: User) -> Result<()>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>>;
    async fn delete_user(&self, id: u64) -> Result<bool>;
}

#[async_trait]
pub trait AttributeRepository: Send + Sync {
    fn kind(&self) -> AttributeKind;
    async fn create(&self, user_id: u64, name: String) -> Result<Attribute>;
    async fn update(&self, attribute: Attribute) -> Result<()>;
    async fn find_by_id(&self, id: u64) -> Result<Option<Attribute>>;
    async fn list_for_owner(&self, user_id: u64) -> Result<Vec<Attribute>>;
    async fn delete(&self, id: u64) -> Result<bool>;
    async fn delete_for_owner(&self, user_id: u64) -> Result<usize>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn create(&self, recipe: NewRecipe) -> Result<Recipe>;
    /// Runs `apply` on the stored recipe while holding the write lock.
    /// Returns `None` when the recipe no longer exists.
    async fn update_with<F, T>(&self, id: u64, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Recipe) -> T + Send + 'static,
        T: Send + 'static;
    async fn find_by_id(&self, id: u64) -> Result<Option<Recipe>>;
    async fn list_for_owner(&self, user_id: u64) -> Result<Vec<Recipe>>;
    async fn delete(&self, id: u64) -> Result<Option<Recipe>>;
    /// Removes every recipe of the owner and returns them.
    async fn delete_for_owner(&self, user_id: u64) -> Result<Vec<Recipe>>;
    /// Removes `id` from the given relation of every recipe.
    async fn detach(&self, kind: AttributeKind, id: u64) -> Result<()>;
}
