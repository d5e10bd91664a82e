// Ingredient and tag catalog: read-only over HTTP, written by the seeding tools

use std::sync::Arc;

use crate::{
    database::RecipeDatabase,
    error::{AppError, AppResult},
    models::{Ingredient, IngredientId, Tag, TagId},
    validation::{self, FieldErrors, COLOR_RE, NAME_MAX_LEN, SLUG_RE},
};

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<RecipeDatabase>,
}

impl CatalogService {
    pub fn new(db: Arc<RecipeDatabase>) -> Self {
        Self { db }
    }

    /// All ingredients ordered by name, optionally narrowed to a case-insensitive name prefix.
    /// Matching runs against `search_name`, lowercased here rather than by SQLite,
    /// whose LIKE only folds ASCII.
    pub async fn list_ingredients(&self, name_prefix: Option<&str>) -> AppResult<Vec<Ingredient>> {
        let ingredients = match name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients
                     WHERE search_name LIKE ? ESCAPE '\\'
                     ORDER BY name, measurement_unit",
                )
                .bind(format!("{}%", escape_like(&prefix.to_lowercase())))
                .fetch_all(&self.db.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, measurement_unit",
                )
                .fetch_all(&self.db.pool)
                .await?
            }
        };
        Ok(ingredients)
    }

    pub async fn get_ingredient(&self, id: IngredientId) -> AppResult<Ingredient> {
        sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Ingredient"))
    }

    pub async fn list_tags(&self) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY id")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(tags)
    }

    pub async fn get_tag(&self, id: TagId) -> AppResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Tag"))
    }

    /// Get-or-create, so reloading the same catalog file is harmless
    pub async fn create_ingredient(&self, name: &str, measurement_unit: &str) -> AppResult<Ingredient> {
        let mut errors = FieldErrors::new();
        validation::check_text(&mut errors, "name", Some(name), Some(NAME_MAX_LEN));
        validation::check_text(
            &mut errors,
            "measurement_unit",
            Some(measurement_unit),
            Some(NAME_MAX_LEN),
        );
        errors.into_result()?;

        sqlx::query(
            "INSERT OR IGNORE INTO ingredients (name, measurement_unit, search_name) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(measurement_unit)
        .bind(name.to_lowercase())
        .execute(&self.db.pool)
        .await?;

        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE name = ? AND measurement_unit = ?",
        )
        .bind(name)
        .bind(measurement_unit)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(ingredient)
    }

    pub async fn create_tag(&self, name: &str, color: &str, slug: &str) -> AppResult<Tag> {
        let mut errors = FieldErrors::new();
        validation::check_text(&mut errors, "name", Some(name), Some(NAME_MAX_LEN));
        validation::check_text(&mut errors, "slug", Some(slug), Some(NAME_MAX_LEN));
        if !slug.is_empty() && !SLUG_RE.is_match(slug) {
            errors.add(
                "slug",
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
        }
        if !COLOR_RE.is_match(color) {
            errors.add("color", "Enter a valid HEX color, e.g. #E26C2D.");
        }
        errors.into_result()?;

        let result = sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?, ?, ?)")
            .bind(name)
            .bind(color.to_uppercase())
            .bind(slug)
            .execute(&self.db.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::BadRequest(_) => AppError::Validation(FieldErrors::single(
                    "slug",
                    "Tag with this slug or color already exists.",
                )),
                other => other,
            })?;

        self.get_tag(result.last_insert_rowid()).await
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
