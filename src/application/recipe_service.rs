use crate::domain::error::DomainError;
use crate::domain::recipe::{
    Attribute, AttributeKind, NewRecipe, Recipe, RecipeDetail, RecipeFilter, RecipeImage,
    RecipePatch, RecipeRequest, RecipeSummary, dedup_ids, normalize_price,
};
use crate::domain::repository::{AttributeRepository, RecipeRepository};
use crate::infrastructure::storage::MediaStorage;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

pub struct RecipeService<R: RecipeRepository, A: AttributeRepository> {
    recipes: Arc<R>,
    tags: Arc<A>,
    ingredients: Arc<A>,
    storage: MediaStorage,
}

impl<R: RecipeRepository, A: AttributeRepository> RecipeService<R, A> {
    pub fn new(recipes: Arc<R>, tags: Arc<A>, ingredients: Arc<A>, storage: MediaStorage) -> Self {
        Self {
            recipes,
            tags,
            ingredients,
            storage,
        }
    }

    fn relation(&self, kind: AttributeKind) -> &A {
        match kind {
            AttributeKind::Tag => self.tags.as_ref(),
            AttributeKind::Ingredient => self.ingredients.as_ref(),
        }
    }

    /// Newest first.
    #[instrument(skip(self, filter))]
    pub async fn list(&self, user_id: u64, filter: &RecipeFilter) -> Result<Vec<RecipeSummary>> {
        let mut recipes: Vec<Recipe> = self
            .recipes
            .list_for_owner(user_id)
            .await?
            .into_iter()
            .filter(|recipe| filter.matches(recipe))
            .collect();
        recipes.sort_by(|a, b| b.id.cmp(&a.id));
        debug!(count = recipes.len(), "Recipes listed");
        Ok(recipes.iter().map(RecipeSummary::from).collect())
    }

    pub async fn get(&self, user_id: u64, id: u64) -> Result<Recipe> {
        match self.recipes.find_by_id(id).await? {
            Some(recipe) if recipe.user_id == user_id => Ok(recipe),
            _ => Err(DomainError::NotFound(format!("Recipe {}", id)).into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn detail(&self, user_id: u64, id: u64) -> Result<RecipeDetail> {
        let recipe = self.get(user_id, id).await?;
        let tags = self.load(AttributeKind::Tag, &recipe.tags).await?;
        let ingredients = self.load(AttributeKind::Ingredient, &recipe.ingredients).await?;

        Ok(RecipeDetail {
            id: recipe.id,
            title: recipe.title,
            ingredients,
            tags,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            image: recipe.image.as_deref().map(|path| self.storage.url(path)),
        })
    }

    #[instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create(&self, user_id: u64, req: RecipeRequest) -> Result<Recipe> {
        req.validate().map_err(DomainError::from)?;
        let price = normalize_price(req.price)?;
        let tags = self.owned_ids(user_id, AttributeKind::Tag, req.tags).await?;
        let ingredients = self
            .owned_ids(user_id, AttributeKind::Ingredient, req.ingredients)
            .await?;

        let recipe = self
            .recipes
            .create(NewRecipe {
                user_id,
                title: req.title,
                time_minutes: req.time_minutes,
                price,
                link: req.link,
                tags,
                ingredients,
            })
            .await?;

        let recipe = self.prune_deleted(recipe).await?;
        info!(recipe_id = recipe.id, "Recipe created");
        Ok(recipe)
    }

    /// A full update is a patch with every field present. Only the fields in
    /// the patch are written, so a concurrent image upload is kept.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, user_id: u64, id: u64, patch: RecipePatch) -> Result<Recipe> {
        patch.validate().map_err(DomainError::from)?;
        self.get(user_id, id).await?;

        let price = patch.price.map(normalize_price).transpose()?;
        let tags = match patch.tags {
            Some(ids) => Some(self.owned_ids(user_id, AttributeKind::Tag, ids).await?),
            None => None,
        };
        let ingredients = match patch.ingredients {
            Some(ids) => Some(
                self.owned_ids(user_id, AttributeKind::Ingredient, ids)
                    .await?,
            ),
            None => None,
        };
        let (title, time_minutes, link) = (patch.title, patch.time_minutes, patch.link);

        let recipe = self
            .recipes
            .update_with(id, move |recipe| {
                if let Some(title) = title {
                    recipe.title = title;
                }
                if let Some(time_minutes) = time_minutes {
                    recipe.time_minutes = time_minutes;
                }
                if let Some(price) = price {
                    recipe.price = price;
                }
                if let Some(link) = link {
                    recipe.link = link;
                }
                if let Some(tags) = tags {
                    recipe.tags = tags;
                }
                if let Some(ingredients) = ingredients {
                    recipe.ingredients = ingredients;
                }
                recipe.clone()
            })
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Recipe {}", id)))?;

        let recipe = self.prune_deleted(recipe).await?;
        info!(recipe_id = id, "Recipe updated");
        Ok(recipe)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: u64, id: u64) -> Result<()> {
        let recipe = self.get(user_id, id).await?;
        self.recipes.delete(recipe.id).await?;
        if let Some(image) = recipe.image {
            self.storage.remove(&image).await;
        }
        info!(recipe_id = id, "Recipe deleted");
        Ok(())
    }

    /// Stores a new image for the recipe, dropping the file it replaces.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_image(&self, user_id: u64, id: u64, data: Vec<u8>) -> Result<RecipeImage> {
        self.get(user_id, id).await?;
        let stored = self.storage.store_recipe_image(data).await?;

        let replacement = stored.clone();
        let previous = match self
            .recipes
            .update_with(id, move |recipe| recipe.image.replace(replacement))
            .await
        {
            Ok(Some(previous)) => previous,
            Ok(None) => {
                self.storage.remove(&stored).await;
                return Err(DomainError::NotFound(format!("Recipe {}", id)).into());
            }
            Err(e) => {
                self.storage.remove(&stored).await;
                return Err(e);
            }
        };
        if let Some(previous) = previous {
            self.storage.remove(&previous).await;
        }

        info!(recipe_id = id, image = %stored, "Recipe image uploaded");
        Ok(RecipeImage {
            id,
            image: Some(self.storage.url(&stored)),
        })
    }

    /// Drops every recipe of the owner along with their image files.
    pub async fn purge_owner(&self, user_id: u64) -> Result<usize> {
        let removed = self.recipes.delete_for_owner(user_id).await?;
        for image in removed.iter().filter_map(|r| r.image.as_deref()) {
            self.storage.remove(image).await;
        }
        Ok(removed.len())
    }

    async fn owned_ids(&self, user_id: u64, kind: AttributeKind, ids: Vec<u64>) -> Result<Vec<u64>> {
        let ids = dedup_ids(ids);
        for id in &ids {
            let owned = matches!(
                self.relation(kind).find_by_id(*id).await?,
                Some(attribute) if attribute.user_id == user_id
            );
            if !owned {
                warn!(kind = %kind, id, "Recipe references unknown attribute");
                return Err(DomainError::field(
                    kind.recipe_field(),
                    format!("Invalid pk \"{}\" - object does not exist.", id),
                )
                .into());
            }
        }
        Ok(ids)
    }

    // Attribute deletion removes the row before detaching it, so an id that
    // passed `owned_ids` but is gone now was missed by that detach.
    async fn prune_deleted(&self, recipe: Recipe) -> Result<Recipe> {
        let mut pruned = false;
        for (kind, ids) in [
            (AttributeKind::Tag, &recipe.tags),
            (AttributeKind::Ingredient, &recipe.ingredients),
        ] {
            for id in ids {
                if self.relation(kind).find_by_id(*id).await?.is_none() {
                    debug!(kind = %kind, id, "Dropping attribute deleted during write");
                    self.recipes.detach(kind, *id).await?;
                    pruned = true;
                }
            }
        }
        if !pruned {
            return Ok(recipe);
        }
        self.recipes
            .find_by_id(recipe.id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Recipe {}", recipe.id)).into())
    }

    async fn load(&self, kind: AttributeKind, ids: &[u64]) -> Result<Vec<Attribute>> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(attribute) = self.relation(kind).find_by_id(*id).await? {
                rows.push(attribute);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::attribute_repository::InMemoryAttributeRepository;
    use crate::data::recipe_repository::InMemoryRecipeRepository;
    use rust_decimal::Decimal;
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    struct Fixture {
        recipes: RecipeService<InMemoryRecipeRepository, InMemoryAttributeRepository>,
        tags: Arc<InMemoryAttributeRepository>,
        media: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let media = tempfile::tempdir().unwrap();
        let tags = Arc::new(InMemoryAttributeRepository::new(AttributeKind::Tag));
        let ingredients = Arc::new(InMemoryAttributeRepository::new(AttributeKind::Ingredient));
        let recipes = RecipeService::new(
            Arc::new(InMemoryRecipeRepository::new()),
            tags.clone(),
            ingredients,
            MediaStorage::new(media.path(), "/media/"),
        );
        Fixture {
            recipes,
            tags,
            media,
        }
    }

    fn request(title: &str, tags: Vec<u64>) -> RecipeRequest {
        RecipeRequest {
            title: title.to_string(),
            time_minutes: 10,
            price: Decimal::new(5, 0),
            link: String::new(),
            tags,
            ingredients: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_price_and_dedups_tags() {
        let fx = fixture();
        let tag = fx.tags.create(1, "Vegan".to_string()).await.unwrap();

        let recipe = fx
            .recipes
            .create(1, request("Salad", vec![tag.id, tag.id]))
            .await
            .unwrap();

        assert_eq!(recipe.price.to_string(), "5.00");
        assert_eq!(recipe.tags, vec![tag.id]);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_tag() {
        let fx = fixture();
        let err = fx
            .recipes
            .create(1, request("Salad", vec![42]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Fields(fields)) if fields.contains_key("tags")
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let fx = fixture();
        let tag = fx.tags.create(1, "Quick".to_string()).await.unwrap();
        let first = fx.recipes.create(1, request("First", vec![tag.id])).await.unwrap();
        fx.recipes.create(1, request("Untagged", vec![])).await.unwrap();
        let third = fx.recipes.create(1, request("Third", vec![tag.id])).await.unwrap();

        let filter = RecipeFilter {
            tags: Some(vec![tag.id]),
            ingredients: None,
        };
        let ids: Vec<u64> = fx
            .recipes
            .list(1, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn test_patch_leaves_omitted_fields() {
        let fx = fixture();
        let recipe = fx.recipes.create(1, request("Soup", vec![])).await.unwrap();

        let updated = fx
            .recipes
            .update(
                1,
                recipe.id,
                RecipePatch {
                    time_minutes: Some(45),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Soup");
        assert_eq!(updated.time_minutes, 45);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let fx = fixture();
        let recipe = fx.recipes.create(1, request("Soup", vec![])).await.unwrap();

        let err = fx
            .recipes
            .upload_image(1, recipe.id, b"plain text".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Fields(fields)) if fields.contains_key("image")
        ));
        assert!(fx.recipes.get(1, recipe.id).await.unwrap().image.is_none());
    }

    #[tokio::test]
    async fn test_other_owner_cannot_delete() {
        let fx = fixture();
        let recipe = fx.recipes.create(1, request("Soup", vec![])).await.unwrap();

        assert!(fx.recipes.delete(2, recipe.id).await.is_err());
        assert!(fx.recipes.get(1, recipe.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_patch_keeps_uploaded_image() {
        let fx = fixture();
        let recipe = fx.recipes.create(1, request("Soup", vec![])).await.unwrap();
        fx.recipes.upload_image(1, recipe.id, png()).await.unwrap();

        let updated = fx
            .recipes
            .update(
                1,
                recipe.id,
                RecipePatch {
                    title: Some("Stew".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let image = updated.image.expect("image survives the patch");
        assert!(fx.media.path().join(image).exists());
    }

    #[tokio::test]
    async fn test_interleaved_patch_and_upload_keep_image() {
        let fx = fixture();
        let tag = fx.tags.create(1, "Warm".to_string()).await.unwrap();
        let recipe = fx.recipes.create(1, request("Soup", vec![])).await.unwrap();

        for round in 0..10 {
            let patch = RecipePatch {
                title: Some(format!("Soup {round}")),
                tags: Some(vec![tag.id]),
                ..Default::default()
            };
            let (updated, uploaded) = tokio::join!(
                fx.recipes.update(1, recipe.id, patch),
                fx.recipes.upload_image(1, recipe.id, png()),
            );
            updated.unwrap();
            uploaded.unwrap();

            let stored = fx.recipes.get(1, recipe.id).await.unwrap();
            let image = stored.image.expect("upload is never overwritten");
            assert!(fx.media.path().join(image).exists());
        }
    }

    #[tokio::test]
    async fn test_update_drops_attribute_deleted_mid_write() {
        let fx = fixture();
        let tag = fx.tags.create(1, "Gone soon".to_string()).await.unwrap();
        let recipe = fx
            .recipes
            .create(1, request("Soup", vec![tag.id]))
            .await
            .unwrap();

        // Row removed but not yet detached, as during a concurrent delete
        fx.tags.delete(tag.id).await.unwrap();

        let updated = fx
            .recipes
            .update(1, recipe.id, RecipePatch::default())
            .await
            .unwrap();
        assert!(updated.tags.is_empty());
        assert!(fx.recipes.get(1, recipe.id).await.unwrap().tags.is_empty());
    }
}
