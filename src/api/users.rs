use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        OriginalUri, Path, RawQuery, State,
    },
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use crate::{
    api::query_pairs,
    app_state::AppState,
    error::AppResult,
    infrastructure::Vc,
    models::{
        CreateUserRequest, CreatedUserResponse, SetPasswordRequest, SubscriptionResponse,
        UserResponse,
    },
    pagination::{Page, PageRequest},
    services::user_service::parse_recipes_limit,
};

pub async fn list_users_handler(
    State(state): State<AppState>,
    vc: Vc,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Page<UserResponse>>> {
    let pairs = query_pairs(query)?;
    let page = PageRequest::from_pairs(uri.path(), &pairs, &state.config.pagination)?;
    Ok(Json(state.users.list_users(&vc, &page).await?))
}

pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CreatedUserResponse>)> {
    let Json(req) = payload?;
    let user = state.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserResponse>> {
    let Path(id) = path?;
    Ok(Json(state.users.get_user(&vc, id).await?))
}

pub async fn me_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.users.me(&vc).await?))
}

pub async fn set_password_handler(
    State(state): State<AppState>,
    vc: Vc,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    vc.require_user()?;
    let Json(req) = payload?;
    state.users.set_password(&vc, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscriptions_handler(
    State(state): State<AppState>,
    vc: Vc,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Page<SubscriptionResponse>>> {
    vc.require_user()?;
    let pairs = query_pairs(query)?;
    let page = PageRequest::from_pairs(uri.path(), &pairs, &state.config.pagination)?;
    let recipes_limit = parse_recipes_limit(&pairs);
    Ok(Json(state.users.subscriptions(&vc, &page, recipes_limit).await?))
}

pub async fn subscribe_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
    RawQuery(query): RawQuery,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    vc.require_user()?;
    let Path(author_id) = path?;
    let recipes_limit = parse_recipes_limit(&query_pairs(query)?);
    let subscription = state.users.subscribe(&vc, author_id, recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn unsubscribe_handler(
    State(state): State<AppState>,
    vc: Vc,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<StatusCode> {
    vc.require_user()?;
    let Path(author_id) = path?;
    state.users.unsubscribe(&vc, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_user_router() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users_handler).post(register_handler))
        .route("/users/me/", get(me_handler))
        .route("/users/set_password/", post(set_password_handler))
        .route("/users/subscriptions/", get(subscriptions_handler))
        .route("/users/{id}/", get(get_user_handler))
        .route(
            "/users/{id}/subscribe/",
            post(subscribe_handler).delete(unsubscribe_handler),
        )
}
