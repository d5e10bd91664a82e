use crate::error::{AppError, AppResult};
use crate::models::UserId;

/// Who is making the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: Option<UserId>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            user_id: None,
            request_id,
        }
    }

    pub fn authenticated(user_id: UserId, request_id: String) -> Self {
        ViewerContext {
            user_id: Some(user_id),
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The viewer's user id, or 401 for anonymous requests
    pub fn require_user(&self) -> AppResult<UserId> {
        self.user_id.ok_or_else(AppError::unauthenticated)
    }
}
