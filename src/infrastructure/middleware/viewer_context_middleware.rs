// ViewerContext middleware: resolves the auth token into a request-scoped
// ViewerContext and stores it in the request extensions

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    database::RecipeDatabase,
    error::{AppError, AppResult},
    infrastructure::{security, viewer::ViewerContext},
};

/// Application state that can reach the database
pub trait HasDatabase {
    fn database(&self) -> &RecipeDatabase;
}

pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasDatabase + Clone + Send + Sync + 'static,
{
    let token = extract_token_from_request(request.headers())?;
    let viewer_context = create_viewer_context(token, app_state.database()).await?;

    tracing::debug!(
        request_id = %viewer_context.request_id,
        user_id = ?viewer_context.user_id,
        "resolved viewer"
    );

    request.extensions_mut().insert(Arc::new(viewer_context));
    Ok(next.run(request).await)
}

/// Pull the token key out of `Authorization: Token <key>` (`Bearer` is accepted too).
/// Requests without the header, or with another scheme, are anonymous.
fn extract_token_from_request(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid token header.".to_string()))?;

    let mut parts = auth_str.split_whitespace();
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }

    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(Some(key.to_string())),
        (None, _) => Err(AppError::Unauthorized(
            "Invalid token header. No credentials provided.".to_string(),
        )),
        (Some(_), Some(_)) => Err(AppError::Unauthorized(
            "Invalid token header. Token string should not contain spaces.".to_string(),
        )),
    }
}

async fn create_viewer_context(
    token: Option<String>,
    db: &RecipeDatabase,
) -> AppResult<ViewerContext> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let Some(key) = token else {
        return Ok(ViewerContext::anonymous(request_id));
    };

    match security::user_for_token(&db.pool, &key).await? {
        Some(user_id) => Ok(ViewerContext::authenticated(user_id, request_id)),
        None => Err(AppError::Unauthorized("Invalid token.".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Token abc123"));
        assert_eq!(
            extract_token_from_request(&headers).unwrap(),
            Some("abc123".to_string())
        );

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(
            extract_token_from_request(&headers).unwrap(),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_extract_token_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token_from_request(&headers).unwrap(), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(extract_token_from_request(&headers).unwrap(), None);
    }

    #[test]
    fn test_extract_token_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Token"));
        assert!(extract_token_from_request(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Token a b"));
        assert!(extract_token_from_request(&headers).is_err());
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let db = RecipeDatabase::new_in_memory().await.unwrap();
        let result = create_viewer_context(Some("missing".into()), &db).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let anon = create_viewer_context(None, &db).await.unwrap();
        assert!(!anon.is_authenticated());
        assert!(anon.request_id.starts_with("req-"));
    }
}
