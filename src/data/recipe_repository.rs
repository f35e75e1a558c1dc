use crate::domain::recipe::{AttributeKind, NewRecipe, Recipe};
use crate::domain::repository::RecipeRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

#[derive(Clone)]
pub struct InMemoryRecipeRepository {
    storage: Arc<RwLock<HashMap<u64, Recipe>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryRecipeRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryRecipeRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecipeRepository for InMemoryRecipeRepository {
    #[instrument(skip(self, recipe), fields(user_id = recipe.user_id))]
    async fn create(&self, recipe: NewRecipe) -> Result<Recipe> {
        let recipe = Recipe {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: recipe.user_id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags: recipe.tags,
            ingredients: recipe.ingredients,
            image: None,
        };
        trace!("Acquiring write lock for recipe storage");
        self.storage.write().await.insert(recipe.id, recipe.clone());
        debug!(recipe_id = recipe.id, "Recipe saved to memory storage");
        Ok(recipe)
    }

    #[instrument(skip(self, apply))]
    async fn update_with<F, T>(&self, id: u64, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Recipe) -> T + Send + 'static,
        T: Send + 'static,
    {
        trace!("Acquiring write lock for recipe storage");
        let mut storage = self.storage.write().await;
        match storage.get_mut(&id) {
            Some(recipe) => {
                debug!("Recipe updated in place");
                Ok(Some(apply(recipe)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Recipe>> {
        Ok(self.storage.read().await.get(&id).cloned())
    }

    async fn list_for_owner(&self, user_id: u64) -> Result<Vec<Recipe>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: u64) -> Result<Option<Recipe>> {
        Ok(self.storage.write().await.remove(&id))
    }

    #[instrument(skip(self))]
    async fn delete_for_owner(&self, user_id: u64) -> Result<Vec<Recipe>> {
        let mut storage = self.storage.write().await;
        let ids: Vec<u64> = storage
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.id)
            .collect();
        let removed: Vec<Recipe> = ids.iter().filter_map(|id| storage.remove(id)).collect();
        debug!(removed = removed.len(), "Owner recipes removed");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn detach(&self, kind: AttributeKind, id: u64) -> Result<()> {
        let mut storage = self.storage.write().await;
        for recipe in storage.values_mut() {
            let relation = match kind {
                AttributeKind::Tag => &mut recipe.tags,
                AttributeKind::Ingredient => &mut recipe.ingredients,
            };
            relation.retain(|existing| *existing != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample(user_id: u64, tags: Vec<u64>, ingredients: Vec<u64>) -> NewRecipe {
        NewRecipe {
            user_id,
            title: "Sample recipe".to_string(),
            time_minutes: 10,
            price: Decimal::new(500, 2),
            link: String::new(),
            tags,
            ingredients,
        }
    }

    #[tokio::test]
    async fn test_create_starts_without_image() {
        let repo = InMemoryRecipeRepository::new();
        let recipe = repo.create(sample(1, vec![], vec![])).await.unwrap();

        assert_eq!(recipe.id, 1);
        assert!(recipe.image.is_none());
        assert!(repo.find_by_id(recipe.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_detach_removes_id_from_matching_relation_only() {
        let repo = InMemoryRecipeRepository::new();
        let recipe = repo.create(sample(1, vec![1, 2], vec![1])).await.unwrap();

        repo.detach(AttributeKind::Tag, 1).await.unwrap();

        let stored = repo.find_by_id(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec![2]);
        assert_eq!(stored.ingredients, vec![1]);
    }

    #[tokio::test]
    async fn test_delete_for_owner_returns_removed_recipes() {
        let repo = InMemoryRecipeRepository::new();
        repo.create(sample(1, vec![], vec![])).await.unwrap();
        repo.create(sample(1, vec![], vec![])).await.unwrap();
        repo.create(sample(2, vec![], vec![])).await.unwrap();

        let removed = repo.delete_for_owner(1).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(repo.list_for_owner(1).await.unwrap().is_empty());
        assert_eq!(repo.list_for_owner(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_with_unknown_recipe_returns_none() {
        let repo = InMemoryRecipeRepository::new();
        let recipe = repo.create(sample(1, vec![], vec![])).await.unwrap();
        repo.delete(recipe.id).await.unwrap();

        let result = repo
            .update_with(recipe.id, |r| r.title = "Changed".to_string())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_with_touches_only_applied_fields() {
        let repo = InMemoryRecipeRepository::new();
        let recipe = repo.create(sample(1, vec![3], vec![])).await.unwrap();
        repo.update_with(recipe.id, |r| r.image = Some("uploads/recipe/a.png".to_string()))
            .await
            .unwrap();

        let previous = repo
            .update_with(recipe.id, |r| std::mem::replace(&mut r.title, "Renamed".to_string()))
            .await
            .unwrap();

        assert_eq!(previous.as_deref(), Some("Sample recipe"));
        let stored = repo.find_by_id(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.tags, vec![3]);
        assert_eq!(stored.image.as_deref(), Some("uploads/recipe/a.png"));
    }
}
