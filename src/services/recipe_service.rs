// Recipe aggregate: write path (validate, persist recipe + links) and read representation

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    config::LimitsConfig,
    database::RecipeDatabase,
    error::{AppError, AppResult},
    infrastructure::{media, MediaStorage, ViewerContext},
    models::{
        IngredientAmount, RecipeFilter, RecipeId, RecipeIngredientLine, RecipeResponse, RecipeRow,
        RecipeShort, RecipeWriteRequest, Tag, TagId, UserId,
    },
    pagination::{Page, PageRequest},
    services::{relation_service::RecipeRelation, user_service},
    validation::{self, FieldErrors, NAME_MAX_LEN, REQUIRED},
};

const RECIPE_COLUMNS: &str = "r.id, r.name, r.text, r.image, r.cooking_time, r.author_id, r.created";

#[derive(Clone)]
pub struct RecipeService {
    db: Arc<RecipeDatabase>,
    media: Arc<dyn MediaStorage>,
    limits: LimitsConfig,
}

/// A write payload that passed validation
struct ValidatedRecipe {
    name: Option<String>,
    text: Option<String>,
    cooking_time: Option<i64>,
    image: Option<String>,
    tags: Vec<TagId>,
    ingredients: Vec<IngredientAmount>,
}

impl RecipeService {
    pub fn new(db: Arc<RecipeDatabase>, media: Arc<dyn MediaStorage>, limits: LimitsConfig) -> Self {
        Self { db, media, limits }
    }

    pub async fn create_recipe(
        &self,
        vc: &ViewerContext,
        req: RecipeWriteRequest,
    ) -> AppResult<RecipeResponse> {
        let author_id = vc.require_user()?;
        let recipe = self.validate(req, true).await?;

        let image_data = recipe.image.as_deref().unwrap_or_default();
        let image_path = self.media.save_image(image_data).await?;

        let result = self.insert_recipe(author_id, &recipe, &image_path).await;
        let recipe_id = match result {
            Ok(id) => id,
            Err(e) => {
                self.media.delete(&image_path).await?;
                return Err(e);
            }
        };

        tracing::info!(recipe_id, author_id, "created recipe");
        self.get_recipe(vc, recipe_id).await
    }

    /// PATCH: scalar fields are optional, tags and ingredients are replaced wholesale
    pub async fn update_recipe(
        &self,
        vc: &ViewerContext,
        recipe_id: RecipeId,
        req: RecipeWriteRequest,
    ) -> AppResult<RecipeResponse> {
        let user_id = vc.require_user()?;
        let existing = fetch_recipe_row(&self.db.pool, recipe_id).await?;
        ensure_author(&existing, user_id)?;

        let recipe = self.validate(req, false).await?;

        let new_image = match recipe.image.as_deref() {
            Some(data) if !data.is_empty() => Some(self.media.save_image(data).await?),
            _ => None,
        };

        if let Err(e) = self
            .replace_recipe(recipe_id, &recipe, new_image.as_deref())
            .await
        {
            if let Some(path) = &new_image {
                self.media.delete(path).await?;
            }
            return Err(e);
        }

        if new_image.is_some() {
            self.media.delete(&existing.image).await?;
        }

        tracing::info!(recipe_id, user_id, "updated recipe");
        self.get_recipe(vc, recipe_id).await
    }

    pub async fn delete_recipe(&self, vc: &ViewerContext, recipe_id: RecipeId) -> AppResult<()> {
        let user_id = vc.require_user()?;
        let existing = fetch_recipe_row(&self.db.pool, recipe_id).await?;
        ensure_author(&existing, user_id)?;

        // Links, favorites and cart rows cascade
        sqlx::query("DELETE FROM recipes WHERE id = ?")
            .bind(recipe_id)
            .execute(&self.db.pool)
            .await?;
        self.media.delete(&existing.image).await?;

        tracing::info!(recipe_id, user_id, "deleted recipe");
        Ok(())
    }

    pub async fn get_recipe(&self, vc: &ViewerContext, recipe_id: RecipeId) -> AppResult<RecipeResponse> {
        let row = fetch_recipe_row(&self.db.pool, recipe_id).await?;
        self.build_response(vc.user_id, row).await
    }

    pub async fn list_recipes(
        &self,
        vc: &ViewerContext,
        filter: &RecipeFilter,
        page: &PageRequest,
    ) -> AppResult<Page<RecipeResponse>> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM recipes r WHERE 1 = 1");
        push_filters(&mut count_query, filter, vc.user_id);
        let count: i64 = count_query
            .build()
            .fetch_one(&self.db.pool)
            .await?
            .get(0);

        page.check(count)?;

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM recipes r WHERE 1 = 1",
            RECIPE_COLUMNS
        ));
        push_filters(&mut query, filter, vc.user_id);
        query.push(" ORDER BY r.name, r.id LIMIT ");
        query.push_bind(page.limit());
        query.push(" OFFSET ");
        query.push_bind(page.offset());

        let rows = query
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.db.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.build_response(vc.user_id, row).await?);
        }
        Ok(Page::new(page, count, results))
    }

    async fn build_response(&self, viewer: Option<UserId>, row: RecipeRow) -> AppResult<RecipeResponse> {
        let pool = &self.db.pool;

        let tags = sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name, t.color, t.slug FROM tags t
             JOIN recipe_tags rt ON rt.tag_id = t.id
             WHERE rt.recipe_id = ? ORDER BY t.id",
        )
        .bind(row.id)
        .fetch_all(pool)
        .await?;

        let ingredients = fetch_ingredient_lines(pool, row.id).await?;
        let author = user_service::load_profile(pool, viewer, row.author_id).await?;

        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(user_id) => (
                RecipeRelation::Favorite.exists(pool, user_id, row.id).await?,
                RecipeRelation::ShoppingCart.exists(pool, user_id, row.id).await?,
            ),
            None => (false, false),
        };

        Ok(RecipeResponse {
            id: row.id,
            tags,
            author,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
            image: self.media.url(&row.image),
            name: row.name,
            text: row.text,
            cooking_time: row.cooking_time,
        })
    }

    async fn validate(&self, req: RecipeWriteRequest, creating: bool) -> AppResult<ValidatedRecipe> {
        let mut errors = FieldErrors::new();
        let limits = &self.limits;

        if creating || req.name.is_some() {
            validation::check_text(&mut errors, "name", req.name.as_deref(), Some(NAME_MAX_LEN));
        }
        if creating || req.text.is_some() {
            validation::check_text(&mut errors, "text", req.text.as_deref(), None);
        }
        match req.cooking_time {
            Some(minutes) => validation::check_range(
                &mut errors,
                "cooking_time",
                minutes,
                limits.min_cooking_time,
                limits.max_cooking_time,
            ),
            None if creating => errors.add("cooking_time", REQUIRED),
            None => {}
        }
        match req.image.as_deref() {
            Some(data) if !data.is_empty() => {
                if let Err(AppError::Validation(image_errors)) = media::decode_data_uri(data) {
                    for message in image_errors.get("image").unwrap_or_default() {
                        errors.add("image", message.clone());
                    }
                }
            }
            _ if creating => errors.add("image", REQUIRED),
            _ => {}
        }

        let tags = req.tags.unwrap_or_default();
        if tags.is_empty() {
            errors.add("tags", "At least one tag is required.");
        } else if has_duplicates(tags.iter().copied()) {
            errors.add("tags", "Tags must not repeat.");
        } else {
            for missing in missing_ids(&self.db.pool, "tags", &tags).await? {
                errors.add("tags", format!("Invalid pk \"{}\" - object does not exist.", missing));
            }
        }

        let ingredients = req.ingredients.unwrap_or_default();
        if ingredients.is_empty() {
            errors.add("ingredients", "At least one ingredient is required.");
        } else if has_duplicates(ingredients.iter().map(|i| i.id)) {
            errors.add("ingredients", "Ingredients must not repeat.");
        } else {
            let ids: Vec<i64> = ingredients.iter().map(|i| i.id).collect();
            for missing in missing_ids(&self.db.pool, "ingredients", &ids).await? {
                errors.add(
                    "ingredients",
                    format!("Invalid pk \"{}\" - object does not exist.", missing),
                );
            }
            for item in &ingredients {
                if item.amount < limits.min_amount || item.amount > limits.max_amount {
                    errors.add(
                        "ingredients",
                        format!(
                            "Amount for ingredient {} must be between {} and {}.",
                            item.id, limits.min_amount, limits.max_amount
                        ),
                    );
                }
            }
        }

        errors.into_result()?;

        Ok(ValidatedRecipe {
            name: req.name,
            text: req.text,
            cooking_time: req.cooking_time,
            image: req.image,
            tags,
            ingredients,
        })
    }

    async fn insert_recipe(
        &self,
        author_id: UserId,
        recipe: &ValidatedRecipe,
        image_path: &str,
    ) -> AppResult<RecipeId> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.db.pool.begin().await?;

        let recipe_id = sqlx::query(
            "INSERT INTO recipes (name, text, image, cooking_time, author_id, created)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(recipe.name.as_deref().unwrap_or_default())
        .bind(recipe.text.as_deref().unwrap_or_default())
        .bind(image_path)
        .bind(recipe.cooking_time.unwrap_or_default())
        .bind(author_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_links(&mut tx, recipe_id, &recipe.tags, &recipe.ingredients).await?;
        tx.commit().await?;
        Ok(recipe_id)
    }

    async fn replace_recipe(
        &self,
        recipe_id: RecipeId,
        recipe: &ValidatedRecipe,
        image_path: Option<&str>,
    ) -> AppResult<()> {
        let mut tx = self.db.pool.begin().await?;

        sqlx::query(
            "UPDATE recipes SET
                name = COALESCE(?, name),
                text = COALESCE(?, text),
                cooking_time = COALESCE(?, cooking_time),
                image = COALESCE(?, image)
             WHERE id = ?",
        )
        .bind(recipe.name.as_deref())
        .bind(recipe.text.as_deref())
        .bind(recipe.cooking_time)
        .bind(image_path)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;

        insert_links(&mut tx, recipe_id, &recipe.tags, &recipe.ingredients).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_links(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    recipe_id: RecipeId,
    tags: &[TagId],
    ingredients: &[IngredientAmount],
) -> AppResult<()> {
    let mut tag_insert = QueryBuilder::<Sqlite>::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tag_insert.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    tag_insert.build().execute(&mut **tx).await?;

    let mut ingredient_insert = QueryBuilder::<Sqlite>::new(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
    );
    ingredient_insert.push_values(ingredients, |mut b, item| {
        b.push_bind(recipe_id)
            .push_bind(item.id)
            .push_bind(item.amount);
    });
    ingredient_insert.build().execute(&mut **tx).await?;

    Ok(())
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &RecipeFilter, viewer: Option<UserId>) {
    if let Some(author_id) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author_id);
    }

    if !filter.tags.is_empty() {
        query.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
               WHERE rt.recipe_id = r.id AND t.slug IN (",
        );
        let mut separated = query.separated(", ");
        for slug in &filter.tags {
            separated.push_bind(slug.clone());
        }
        query.push("))");
    }

    // Viewer-relative flags are ignored for anonymous requests
    if let Some(user_id) = viewer {
        if filter.is_favorited {
            query.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
            query.push_bind(user_id);
            query.push(")");
        }
        if filter.is_in_shopping_cart {
            query.push(
                " AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
            );
            query.push_bind(user_id);
            query.push(")");
        }
    }
}

/// Ids from `ids` with no row in `table`, in request order
async fn missing_ids(pool: &SqlitePool, table: &str, ids: &[i64]) -> AppResult<Vec<i64>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE id IN (", table));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    query.push(")");

    let found: HashSet<i64> = query
        .build()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get::<i64, _>(0))
        .collect();

    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

fn has_duplicates(ids: impl Iterator<Item = i64>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

fn ensure_author(recipe: &RecipeRow, user_id: UserId) -> AppResult<()> {
    if recipe.author_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn fetch_recipe_row(pool: &SqlitePool, recipe_id: RecipeId) -> AppResult<RecipeRow> {
    sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {} FROM recipes r WHERE r.id = ?",
        RECIPE_COLUMNS
    ))
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Recipe"))
}

pub(crate) async fn fetch_ingredient_lines(
    pool: &SqlitePool,
    recipe_id: RecipeId,
) -> AppResult<Vec<RecipeIngredientLine>> {
    let lines = sqlx::query_as::<_, RecipeIngredientLine>(
        "SELECT i.id, i.name, i.measurement_unit, ri.amount FROM recipe_ingredients ri
         JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ? ORDER BY ri.id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;
    Ok(lines)
}

pub(crate) fn short_projection(media: &dyn MediaStorage, row: &RecipeRow) -> RecipeShort {
    RecipeShort {
        id: row.id,
        name: row.name.clone(),
        image: media.url(&row.image),
        cooking_time: row.cooking_time,
    }
}
