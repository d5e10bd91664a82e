// Vc extractor - hands the request's ViewerContext to handlers

use crate::infrastructure::viewer::ViewerContext;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::error::AppError;

/// Cheap-to-clone handle on the request's ViewerContext.
///
/// Derefs to `ViewerContext`, so handlers read `vc.user_id` or call
/// `vc.require_user()?` directly:
///
/// ```rust,ignore
/// async fn handler(vc: Vc) -> AppResult<Json<UserResponse>> {
///     let user_id = vc.require_user()?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// The middleware must run first; a missing extension is a wiring bug
impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or_else(|| AppError::Internal("viewer context middleware not installed".to_string()));

        async move { vc }
    }
}
