// HTTP surface: everything lives under /api, uploaded media under /media

pub mod catalog;
pub mod recipes;
pub mod users;

use axum::Router;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::middleware::viewer_context_middleware,
};

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(catalog::create_catalog_router())
        .merge(recipes::create_recipe_router())
        .merge(users::create_user_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ));

    let mut router = Router::new().nest("/api", api);
    match media_mount_path(&state.config.media.url) {
        Some(path) => {
            router = router.nest_service(&path, ServeDir::new(state.media.root().clone()));
        }
        None => tracing::warn!(
            url = %state.config.media.url,
            "MEDIA_URL is not a local path, media files are not served"
        ),
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Route prefix for `MEDIA_URL`: `/media/` mounts at `/media`. Absolute URLs and
/// the bare root are served elsewhere.
fn media_mount_path(url: &str) -> Option<String> {
    if url.contains("://") {
        return None;
    }
    let trimmed = url.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("/{}", trimmed))
}

/// Decoded query string as ordered pairs; repeated keys such as `tags` are kept
pub(crate) fn query_pairs(raw: Option<String>) -> AppResult<Vec<(String, String)>> {
    match raw {
        None => Ok(Vec::new()),
        Some(query) => serde_urlencoded::from_str(&query)
            .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e))),
    }
}
