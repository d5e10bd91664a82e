use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        OriginalUri, Path, RawQuery, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

use crate::{
    api::query_pairs,
    app_state::AppState,
    error::AppResult,
    infrastructure::Vc,
    models::{RecipeFilter, RecipeResponse, RecipeShort, RecipeWriteRequest},
    pagination::{Page, PageRequest},
    services::{shopping_list::SHOPPING_LIST_FILENAME, RecipeRelation},
};

pub async fn list_recipes_handler(
    State(state): State<AppState>,
    vc: Vc,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Page<RecipeResponse>>> {
    let pairs = query_pairs(query)?;
    let filter = RecipeFilter::from_pairs(&pairs);
    let page = PageRequest::from_pairs(uri.path(), &pairs, &state.config.pagination)?;
    Ok(Json(state.recipes.list_recipes(&vc, &filter, &page).await?))
}

pub async fn create_recipe_handler(
    State(state): State<AppState>,
    vc: Vc,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RecipeResponse>)> {
    vc.require_user()?;
    let Json(req) = payload?;
    let recipe = state.recipes.create_recipe(&vc, req).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn get_recipe_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<RecipeResponse>> {
    let Path(id) = path?;
    Ok(Json(state.recipes.get_recipe(&vc, id).await?))
}

pub async fn update_recipe_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecipeWriteRequest>, JsonRejection>,
) -> AppResult<Json<RecipeResponse>> {
    vc.require_user()?;
    let Path(id) = path?;
    let Json(req) = payload?;
    Ok(Json(state.recipes.update_recipe(&vc, id, req).await?))
}

pub async fn delete_recipe_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    vc.require_user()?;
    let Path(id) = path?;
    state.recipes.delete_recipe(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    add_relation(&state, &vc, RecipeRelation::Favorite, path).await
}

pub async fn remove_favorite_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    remove_relation(&state, &vc, RecipeRelation::Favorite, path).await
}

pub async fn add_to_cart_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    add_relation(&state, &vc, RecipeRelation::ShoppingCart, path).await
}

pub async fn remove_from_cart_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    remove_relation(&state, &vc, RecipeRelation::ShoppingCart, path).await
}

pub async fn favorites_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<RecipeShort>>> {
    Ok(Json(state.relations.favorites(&vc).await?))
}

pub async fn download_shopping_cart_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<impl IntoResponse> {
    let list = state.shopping_list.build(&vc).await?;
    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME),
        ),
    ];
    Ok((headers, list.render()))
}

async fn add_relation(
    state: &AppState,
    vc: &Vc,
    relation: RecipeRelation,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    vc.require_user()?;
    let Path(id) = path?;
    let recipe = state.relations.add(vc, relation, id).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn remove_relation(
    state: &AppState,
    vc: &Vc,
    relation: RecipeRelation,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    vc.require_user()?;
    let Path(id) = path?;
    state.relations.remove(vc, relation, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_recipe_router() -> Router<AppState> {
    Router::new()
        .route("/recipes/", get(list_recipes_handler).post(create_recipe_handler))
        .route("/recipes/favorites/", get(favorites_handler))
        .route(
            "/recipes/download_shopping_cart/",
            get(download_shopping_cart_handler),
        )
        .route(
            "/recipes/{id}/",
            get(get_recipe_handler)
                .patch(update_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route(
            "/recipes/{id}/favorite/",
            post(add_favorite_handler).delete(remove_favorite_handler),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(add_to_cart_handler).delete(remove_from_cart_handler),
        )
}
