// Favorite and shopping-cart presence toggles over (user, recipe) join rows

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
    database::RecipeDatabase,
    error::{AppError, AppResult},
    infrastructure::{MediaStorage, ViewerContext},
    models::{RecipeId, RecipeRow, RecipeShort, UserId},
    services::recipe_service::{fetch_recipe_row, short_projection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    pub fn table(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::ShoppingCart => "shopping_cart",
        }
    }

    fn already_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    fn not_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }

    pub async fn exists(&self, pool: &SqlitePool, user_id: UserId, recipe_id: RecipeId) -> AppResult<bool> {
        let row = sqlx::query(&format!(
            "SELECT 1 FROM {} WHERE user_id = ? AND recipe_id = ?",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }
}

#[derive(Clone)]
pub struct RelationService {
    db: Arc<RecipeDatabase>,
    media: Arc<dyn MediaStorage>,
}

impl RelationService {
    pub fn new(db: Arc<RecipeDatabase>, media: Arc<dyn MediaStorage>) -> Self {
        Self { db, media }
    }

    /// Create the join row. The unique constraint decides duplicates, so two
    /// racing requests still produce exactly one row and one 400.
    pub async fn add(
        &self,
        vc: &ViewerContext,
        relation: RecipeRelation,
        recipe_id: RecipeId,
    ) -> AppResult<RecipeShort> {
        let user_id = vc.require_user()?;
        let recipe = fetch_recipe_row(&self.db.pool, recipe_id).await?;

        sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id, created) VALUES (?, ?, ?)",
            relation.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.db.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::BadRequest(_) => AppError::BadRequest(relation.already_present().to_string()),
            other => other,
        })?;

        tracing::info!(user_id, recipe_id, relation = relation.table(), "added recipe relation");
        Ok(short_projection(self.media.as_ref(), &recipe))
    }

    pub async fn remove(
        &self,
        vc: &ViewerContext,
        relation: RecipeRelation,
        recipe_id: RecipeId,
    ) -> AppResult<()> {
        let user_id = vc.require_user()?;
        fetch_recipe_row(&self.db.pool, recipe_id).await?;

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = ? AND recipe_id = ?",
            relation.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest(relation.not_present().to_string()));
        }

        tracing::info!(user_id, recipe_id, relation = relation.table(), "removed recipe relation");
        Ok(())
    }

    /// The viewer's favorited recipes, most recently added first
    pub async fn favorites(&self, vc: &ViewerContext) -> AppResult<Vec<RecipeShort>> {
        let user_id = vc.require_user()?;
        let rows = sqlx::query_as::<_, RecipeRow>(
            "SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.author_id, r.created
             FROM favorites f JOIN recipes r ON r.id = f.recipe_id
             WHERE f.user_id = ? ORDER BY f.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| short_projection(self.media.as_ref(), row))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_distinct() {
        assert_eq!(RecipeRelation::Favorite.table(), "favorites");
        assert_eq!(RecipeRelation::ShoppingCart.table(), "shopping_cart");
        assert_ne!(
            RecipeRelation::Favorite.already_present(),
            RecipeRelation::ShoppingCart.already_present()
        );
    }
}
