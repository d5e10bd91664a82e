use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    error::AppResult,
    models::{Ingredient, Tag},
};

#[derive(Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

pub async fn list_ingredients_handler(
    State(state): State<AppState>,
    query: Result<Query<IngredientSearch>, QueryRejection>,
) -> AppResult<Json<Vec<Ingredient>>> {
    let Query(search) = query?;
    let ingredients = state.catalog.list_ingredients(search.name.as_deref()).await?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Ingredient>> {
    let Path(id) = path?;
    Ok(Json(state.catalog.get_ingredient(id).await?))
}

pub async fn list_tags_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.catalog.list_tags().await?))
}

pub async fn get_tag_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Tag>> {
    let Path(id) = path?;
    Ok(Json(state.catalog.get_tag(id).await?))
}

pub fn create_catalog_router() -> Router<AppState> {
    Router::new()
        .route("/ingredients/", get(list_ingredients_handler))
        .route("/ingredients/{id}/", get(get_ingredient_handler))
        .route("/tags/", get(list_tags_handler))
        .route("/tags/{id}/", get(get_tag_handler))
}
