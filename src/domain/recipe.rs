use crate::domain::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

const PRICE_DECIMAL_PLACES: u32 = 2;
// max_digits = 5 with 2 decimal places leaves 3 integer digits
const PRICE_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "Tag",
            AttributeKind::Ingredient => "Ingredient",
        }
    }

    /// Name of the recipe field that references this kind.
    pub fn recipe_field(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user-owned label attached to recipes: either a tag or an ingredient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    pub id: u64,
    pub name: String,
    #[serde(skip)]
    pub user_id: u64,
}

pub type Tag = Attribute;
pub type Ingredient = Attribute;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AttributeRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters."))]
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct AttributePatch {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters."))]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub time_minutes: u32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<u64>,
    pub ingredients: Vec<u64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub user_id: u64,
    pub title: String,
    pub time_minutes: u32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<u64>,
    pub ingredients: Vec<u64>,
}

/// Payload for create and full update. Omitted relations mean "none".
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecipeRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters."))]
    pub title: String,
    pub time_minutes: u32,
    pub price: Decimal,
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(default)]
    pub ingredients: Vec<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct RecipePatch {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    pub time_minutes: Option<u32>,
    pub price: Option<Decimal>,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub link: Option<String>,
    pub tags: Option<Vec<u64>>,
    pub ingredients: Option<Vec<u64>>,
}

impl From<RecipeRequest> for RecipePatch {
    fn from(req: RecipeRequest) -> Self {
        Self {
            title: Some(req.title),
            time_minutes: Some(req.time_minutes),
            price: Some(req.price),
            link: Some(req.link),
            tags: Some(req.tags),
            ingredients: Some(req.ingredients),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: u64,
    pub title: String,
    pub ingredients: Vec<u64>,
    pub tags: Vec<u64>,
    pub time_minutes: u32,
    pub price: Decimal,
    pub link: String,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            ingredients: recipe.ingredients.clone(),
            tags: recipe.tags.clone(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: u64,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub tags: Vec<Tag>,
    pub time_minutes: u32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeImage {
    pub id: u64,
    pub image: Option<String>,
}

/// Optional "in" filters for the recipe listing. `None` means unfiltered.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub tags: Option<Vec<u64>>,
    pub ingredients: Option<Vec<u64>>,
}

impl RecipeFilter {
    pub fn from_query(tags: Option<&str>, ingredients: Option<&str>) -> Result<Self, DomainError> {
        Ok(Self {
            tags: parse_optional_ids("tags", tags)?,
            ingredients: parse_optional_ids("ingredients", ingredients)?,
        })
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        let any_of = |wanted: &Option<Vec<u64>>, present: &[u64]| match wanted {
            Some(ids) => present.iter().any(|id| ids.contains(id)),
            None => true,
        };
        any_of(&self.tags, &recipe.tags) && any_of(&self.ingredients, &recipe.ingredients)
    }
}

fn parse_optional_ids(field: &str, raw: Option<&str>) -> Result<Option<Vec<u64>>, DomainError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => parse_ids(field, raw).map(Some),
        _ => Ok(None),
    }
}

/// Converts a comma-separated list such as `"1,2,3"` into ids.
pub fn parse_ids(field: &str, raw: &str) -> Result<Vec<u64>, DomainError> {
    raw.split(',')
        .map(|part| {
            part.trim().parse::<u64>().map_err(|_| {
                DomainError::field(field, format!("\"{}\" is not a valid id.", part.trim()))
            })
        })
        .collect()
}

/// Drops repeated ids, keeping first occurrences in order.
pub fn dedup_ids(ids: Vec<u64>) -> Vec<u64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Checks the decimal(5, 2) bounds and fixes the scale at two places.
pub fn normalize_price(price: Decimal) -> Result<Decimal, DomainError> {
    let mut value = price.normalize();
    if value.scale() > PRICE_DECIMAL_PLACES {
        return Err(DomainError::field(
            "price",
            "Ensure that there are no more than 2 decimal places.",
        ));
    }
    if value.abs() >= Decimal::new(PRICE_LIMIT, 0) {
        return Err(DomainError::field(
            "price",
            "Ensure that there are no more than 5 digits in total.",
        ));
    }
    value.rescale(PRICE_DECIMAL_PLACES);
    Ok(value)
}
