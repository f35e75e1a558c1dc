use crate::domain::error::DomainError;
use crate::domain::recipe::{Attribute, AttributeKind, AttributePatch, AttributeRequest};
use crate::domain::repository::{AttributeRepository, RecipeRepository};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

/// Owner-scoped management of one attribute kind (tags or ingredients).
pub struct AttributeService<A: AttributeRepository, R: RecipeRepository> {
    attributes: Arc<A>,
    recipes: Arc<R>,
}

impl<A: AttributeRepository, R: RecipeRepository> AttributeService<A, R> {
    pub fn new(attributes: Arc<A>, recipes: Arc<R>) -> Self {
        Self {
            attributes,
            recipes,
        }
    }

    /// Lists the owner's rows by name, descending. With `assigned_only`, keeps
    /// only rows referenced by at least one of the owner's recipes.
    #[instrument(skip(self), fields(kind = %self.attributes.kind()))]
    pub async fn list(&self, user_id: u64, assigned_only: bool) -> Result<Vec<Attribute>> {
        let mut rows = self.attributes.list_for_owner(user_id).await?;

        if assigned_only {
            let kind = self.attributes.kind();
            let assigned: HashSet<u64> = self
                .recipes
                .list_for_owner(user_id)
                .await?
                .into_iter()
                .flat_map(|recipe| match kind {
                    AttributeKind::Tag => recipe.tags,
                    AttributeKind::Ingredient => recipe.ingredients,
                })
                .collect();
            rows.retain(|row| assigned.contains(&row.id));
        }

        rows.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));
        debug!(count = rows.len(), assigned_only, "Attributes listed");
        Ok(rows)
    }

    #[instrument(skip(self, req), fields(kind = %self.attributes.kind()))]
    pub async fn create(&self, user_id: u64, req: AttributeRequest) -> Result<Attribute> {
        req.validate().map_err(DomainError::from)?;
        let attribute = self.attributes.create(user_id, req.name).await?;
        info!(id = attribute.id, name = %attribute.name, "Attribute created");
        Ok(attribute)
    }

    /// Rows owned by someone else are reported as missing.
    pub async fn get(&self, user_id: u64, id: u64) -> Result<Attribute> {
        match self.attributes.find_by_id(id).await? {
            Some(attribute) if attribute.user_id == user_id => Ok(attribute),
            _ => Err(DomainError::NotFound(format!("{} {}", self.attributes.kind(), id)).into()),
        }
    }

    #[instrument(skip(self, patch), fields(kind = %self.attributes.kind()))]
    pub async fn update(&self, user_id: u64, id: u64, patch: AttributePatch) -> Result<Attribute> {
        patch.validate().map_err(DomainError::from)?;
        let mut attribute = self.get(user_id, id).await?;
        if let Some(name) = patch.name {
            attribute.name = name;
        }
        self.attributes.update(attribute.clone()).await?;
        info!(id, "Attribute updated");
        Ok(attribute)
    }

    #[instrument(skip(self), fields(kind = %self.attributes.kind()))]
    pub async fn delete(&self, user_id: u64, id: u64) -> Result<()> {
        let attribute = self.get(user_id, id).await?;
        // Row first: a recipe write racing with this delete re-checks existence
        self.attributes.delete(attribute.id).await?;
        self.recipes
            .detach(self.attributes.kind(), attribute.id)
            .await?;
        info!(id, "Attribute deleted");
        Ok(())
    }

    pub async fn purge_owner(&self, user_id: u64) -> Result<usize> {
        self.attributes.delete_for_owner(user_id).await
    }
}
