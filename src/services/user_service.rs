// Accounts and the follow graph between them

use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::{
    database::RecipeDatabase,
    error::{AppError, AppResult},
    infrastructure::{security, MediaStorage, ViewerContext},
    models::{
        CreateUserRequest, CreatedUserResponse, RecipeRow, SetPasswordRequest,
        SubscriptionResponse, UserId, UserResponse, UserRow,
    },
    pagination::{Page, PageRequest},
    services::recipe_service::short_projection,
    validation::{self, FieldErrors, USER_FIELD_MAX_LEN},
};

const USER_COLUMNS: &str = "u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash";
const USER_ORDER: &str = "u.last_name, u.first_name, u.id";

#[derive(Clone)]
pub struct UserService {
    db: Arc<RecipeDatabase>,
    media: Arc<dyn MediaStorage>,
}

impl UserService {
    pub fn new(db: Arc<RecipeDatabase>, media: Arc<dyn MediaStorage>) -> Self {
        Self { db, media }
    }

    pub async fn register(&self, req: CreateUserRequest) -> AppResult<CreatedUserResponse> {
        let mut errors = FieldErrors::new();
        validation::check_email(&mut errors, req.email.as_deref());
        validation::check_username(&mut errors, req.username.as_deref());
        validation::check_text(&mut errors, "first_name", req.first_name.as_deref(), Some(USER_FIELD_MAX_LEN));
        validation::check_text(&mut errors, "last_name", req.last_name.as_deref(), Some(USER_FIELD_MAX_LEN));
        validation::check_text(&mut errors, "password", req.password.as_deref(), None);

        if let Some(email) = req.email.as_deref() {
            if self.exists("email", email).await? {
                errors.add("email", "A user with that email already exists.");
            }
        }
        if let Some(username) = req.username.as_deref() {
            if self.exists("username", username).await? {
                errors.add("username", "A user with that username already exists.");
            }
        }
        errors.into_result()?;

        let email = req.email.unwrap_or_default();
        let username = req.username.unwrap_or_default();
        let first_name = req.first_name.unwrap_or_default();
        let last_name = req.last_name.unwrap_or_default();
        let password_hash = security::hash_password(&req.password.unwrap_or_default())?;

        let id = sqlx::query(
            "INSERT INTO users (email, username, first_name, last_name, password_hash, created)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&email)
        .bind(&username)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&password_hash)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.db.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::BadRequest(_) => AppError::Validation(FieldErrors::single(
                "username",
                "A user with that username or email already exists.",
            )),
            other => other,
        })?
        .last_insert_rowid();

        tracing::info!(user_id = id, %username, "registered user");
        Ok(CreatedUserResponse {
            email,
            id,
            username,
            first_name,
            last_name,
        })
    }

    pub async fn list_users(&self, vc: &ViewerContext, page: &PageRequest) -> AppResult<Page<UserResponse>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db.pool)
            .await?;
        page.check(count)?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users u ORDER BY {} LIMIT ? OFFSET ?",
            USER_COLUMNS, USER_ORDER
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let subscribed = is_subscribed(&self.db.pool, vc.user_id, row.id).await?;
            results.push(UserResponse::from_row(row, subscribed));
        }
        Ok(Page::new(page, count, results))
    }

    pub async fn get_user(&self, vc: &ViewerContext, user_id: UserId) -> AppResult<UserResponse> {
        load_profile(&self.db.pool, vc.user_id, user_id).await
    }

    pub async fn me(&self, vc: &ViewerContext) -> AppResult<UserResponse> {
        let user_id = vc.require_user()?;
        load_profile(&self.db.pool, Some(user_id), user_id).await
    }

    pub async fn set_password(&self, vc: &ViewerContext, req: SetPasswordRequest) -> AppResult<()> {
        let user_id = vc.require_user()?;

        let mut errors = FieldErrors::new();
        validation::check_text(&mut errors, "new_password", req.new_password.as_deref(), None);
        validation::check_text(&mut errors, "current_password", req.current_password.as_deref(), None);
        errors.into_result()?;

        let user = fetch_user(&self.db.pool, user_id).await?;
        let current = req.current_password.unwrap_or_default();
        if !security::verify_password(&current, &user.password_hash)? {
            return Err(AppError::Validation(FieldErrors::single(
                "current_password",
                "Invalid password.",
            )));
        }

        let new_hash = security::hash_password(&req.new_password.unwrap_or_default())?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.db.pool)
            .await?;

        tracing::info!(user_id, "password changed");
        Ok(())
    }

    pub async fn subscribe(
        &self,
        vc: &ViewerContext,
        author_id: UserId,
        recipes_limit: Option<i64>,
    ) -> AppResult<SubscriptionResponse> {
        let user_id = vc.require_user()?;
        let author = fetch_user(&self.db.pool, author_id).await?;

        if author_id == user_id {
            return Err(AppError::BadRequest("You cannot subscribe to yourself.".to_string()));
        }

        sqlx::query("INSERT INTO follows (user_id, author_id, created) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(author_id)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.db.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::BadRequest(_) => {
                    AppError::BadRequest("You are already subscribed to this user.".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id, author_id, "subscribed");
        self.subscription(author, true, recipes_limit).await
    }

    pub async fn unsubscribe(&self, vc: &ViewerContext, author_id: UserId) -> AppResult<()> {
        let user_id = vc.require_user()?;
        fetch_user(&self.db.pool, author_id).await?;

        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.db.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest("You are not subscribed to this user.".to_string()));
        }

        tracing::info!(user_id, author_id, "unsubscribed");
        Ok(())
    }

    pub async fn subscriptions(
        &self,
        vc: &ViewerContext,
        page: &PageRequest,
        recipes_limit: Option<i64>,
    ) -> AppResult<Page<SubscriptionResponse>> {
        let user_id = vc.require_user()?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.db.pool)
            .await?;
        page.check(count)?;

        let authors = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users u JOIN follows f ON f.author_id = u.id
             WHERE f.user_id = ? ORDER BY {} LIMIT ? OFFSET ?",
            USER_COLUMNS, USER_ORDER
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db.pool)
        .await?;

        let mut results = Vec::with_capacity(authors.len());
        for author in authors {
            results.push(self.subscription(author, true, recipes_limit).await?);
        }
        Ok(Page::new(page, count, results))
    }

    async fn subscription(
        &self,
        author: UserRow,
        is_subscribed: bool,
        recipes_limit: Option<i64>,
    ) -> AppResult<SubscriptionResponse> {
        let pool = &self.db.pool;

        let recipes_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE author_id = ?")
            .bind(author.id)
            .fetch_one(pool)
            .await?;

        // SQLite treats a negative LIMIT as "no limit"
        let recipes = sqlx::query_as::<_, RecipeRow>(
            "SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.author_id, r.created
             FROM recipes r WHERE r.author_id = ? ORDER BY r.name, r.id LIMIT ?",
        )
        .bind(author.id)
        .bind(recipes_limit.filter(|limit| *limit >= 0).unwrap_or(-1))
        .fetch_all(pool)
        .await?;

        Ok(SubscriptionResponse {
            user: UserResponse::from_row(author, is_subscribed),
            recipes: recipes
                .iter()
                .map(|row| short_projection(self.media.as_ref(), row))
                .collect(),
            recipes_count,
        })
    }

    async fn exists(&self, column: &str, value: &str) -> AppResult<bool> {
        let row = sqlx::query(&format!("SELECT 1 FROM users WHERE {} = ?", column))
            .bind(value)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.is_some())
    }
}

pub(crate) async fn fetch_user(pool: &SqlitePool, user_id: UserId) -> AppResult<UserRow> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// Public profile of `user_id` with `is_subscribed` relative to `viewer`
pub(crate) async fn load_profile(
    pool: &SqlitePool,
    viewer: Option<UserId>,
    user_id: UserId,
) -> AppResult<UserResponse> {
    let row = fetch_user(pool, user_id).await?;
    let subscribed = is_subscribed(pool, viewer, user_id).await?;
    Ok(UserResponse::from_row(row, subscribed))
}

pub(crate) async fn is_subscribed(
    pool: &SqlitePool,
    viewer: Option<UserId>,
    author_id: UserId,
) -> AppResult<bool> {
    let Some(viewer_id) = viewer else {
        return Ok(false);
    };
    let row = sqlx::query("SELECT 1 AS found FROM follows WHERE user_id = ? AND author_id = ?")
        .bind(viewer_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get::<i64, _>("found") == 1).unwrap_or(false))
}

/// `recipes_limit` query value; anything unparsable means no limit
pub fn parse_recipes_limit(pairs: &[(String, String)]) -> Option<i64> {
    pairs
        .iter()
        .find(|(key, _)| key == "recipes_limit")
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::infrastructure::LocalMediaStorage;
    use crate::validation::REQUIRED;

    async fn service() -> UserService {
        let db = Arc::new(RecipeDatabase::new_in_memory().await.unwrap());
        let media = Arc::new(LocalMediaStorage::new(&MediaConfig {
            root: "media".into(),
            url: "/media/".into(),
        }));
        UserService::new(db, media)
    }

    fn signup(name: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: Some(format!("{}@example.com", name)),
            username: Some(name.to_string()),
            first_name: Some("First".into()),
            last_name: Some(name.to_uppercase()),
            password: Some("correct horse".into()),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_missing_fields() {
        let users = service().await;
        let created = users.register(signup("anna")).await.unwrap();
        assert_eq!(created.username, "anna");

        match users.register(signup("anna")).await {
            Err(AppError::Validation(errors)) => {
                assert!(errors.contains("email"));
                assert!(errors.contains("username"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }

        match users.register(CreateUserRequest::default()).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("password").unwrap()[0], REQUIRED);
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let users = service().await;
        let anna = users.register(signup("anna")).await.unwrap();
        let vc = ViewerContext::authenticated(anna.id, "req".into());

        let result = users.subscribe(&vc, anna.id, None).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_follow_lifecycle() {
        let users = service().await;
        let anna = users.register(signup("anna")).await.unwrap();
        let boris = users.register(signup("boris")).await.unwrap();
        let vc = ViewerContext::authenticated(anna.id, "req".into());

        let sub = users.subscribe(&vc, boris.id, None).await.unwrap();
        assert!(sub.user.is_subscribed);
        assert_eq!(sub.recipes_count, 0);

        let again = users.subscribe(&vc, boris.id, None).await;
        assert!(matches!(again, Err(AppError::BadRequest(_))));

        assert!(users.get_user(&vc, boris.id).await.unwrap().is_subscribed);

        users.unsubscribe(&vc, boris.id).await.unwrap();
        let missing = users.unsubscribe(&vc, boris.id).await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        let unknown = users.subscribe(&vc, 999, None).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_password() {
        let users = service().await;
        let anna = users.register(signup("anna")).await.unwrap();
        let vc = ViewerContext::authenticated(anna.id, "req".into());

        let wrong = users
            .set_password(
                &vc,
                SetPasswordRequest {
                    new_password: Some("new-pass".into()),
                    current_password: Some("nope".into()),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AppError::Validation(_))));

        users
            .set_password(
                &vc,
                SetPasswordRequest {
                    new_password: Some("new-pass".into()),
                    current_password: Some("correct horse".into()),
                },
            )
            .await
            .unwrap();

        let row = fetch_user(&users.db.pool, anna.id).await.unwrap();
        assert!(security::verify_password("new-pass", &row.password_hash).unwrap());
    }

    #[test]
    fn test_parse_recipes_limit() {
        let pairs = vec![("recipes_limit".to_string(), "2".to_string())];
        assert_eq!(parse_recipes_limit(&pairs), Some(2));

        let pairs = vec![("recipes_limit".to_string(), "two".to_string())];
        assert_eq!(parse_recipes_limit(&pairs), None);
        assert_eq!(parse_recipes_limit(&[]), None);
    }
}
