use serde::{Deserialize, Serialize};

use super::{IngredientId, RecipeId, Tag, TagId, UserId, UserResponse};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecipeRow {
    pub id: RecipeId,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i64,
    pub author_id: UserId,
    pub created: i64,
}

/// An ingredient as it appears inside a recipe, with the amount used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipeIngredientLine {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Full read representation returned by every recipe endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
}

/// Minimal projection used by favorites, the cart and subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeShort {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: IngredientId,
    pub amount: i64,
}

/// Create (POST) and partial update (PATCH) payload
///
/// Every field is optional at the type level so that missing fields are
/// reported per field instead of as a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeWriteRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub image: Option<String>,
    pub tags: Option<Vec<TagId>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    /// Build from decoded query pairs; `tags` may repeat, flags are on for any non-zero number
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "author" => filter.author = value.parse().ok(),
                "tags" if !value.is_empty() => filter.tags.push(value.clone()),
                "is_favorited" => filter.is_favorited = is_truthy(value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = is_truthy(value),
                _ => {}
            }
        }
        filter
    }
}

fn is_truthy(value: &str) -> bool {
    value.parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_collects_repeated_tags() {
        let filter = RecipeFilter::from_pairs(&pairs(&[
            ("tags", "breakfast"),
            ("tags", "dinner"),
            ("author", "7"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "0"),
            ("page", "2"),
        ]));
        assert_eq!(filter.tags, vec!["breakfast", "dinner"]);
        assert_eq!(filter.author, Some(7));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn test_filter_ignores_garbage() {
        let filter = RecipeFilter::from_pairs(&pairs(&[("author", "abc"), ("is_favorited", "yes")]));
        assert_eq!(filter, RecipeFilter::default());
    }

    #[test]
    fn test_write_request_accepts_partial_payload() {
        let req: RecipeWriteRequest =
            serde_json::from_str(r#"{"name": "Soup", "ingredients": [{"id": 1, "amount": 10}]}"#)
                .unwrap();
        assert_eq!(req.name.as_deref(), Some("Soup"));
        assert!(req.tags.is_none());
        assert_eq!(req.ingredients.unwrap()[0], IngredientAmount { id: 1, amount: 10 });
    }
}
