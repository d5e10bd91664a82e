use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use foodgram::{
    api::create_router, app_state::AppState, config::Config, database::RecipeDatabase,
    models::CreateUserRequest,
};

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

struct TestApp {
    router: Router,
    state: AppState,
    media: TempDir,
}

struct Response {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Vec<u8>,
}

impl Response {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

impl TestApp {
    async fn new() -> Self {
        Self::with_media_url("/media/").await
    }

    async fn with_media_url(media_url: &str) -> Self {
        let media = TempDir::new().unwrap();
        let mut config = Config::in_memory(media.path().to_string_lossy().to_string());
        config.media.url = media_url.to_string();
        let database = Arc::new(RecipeDatabase::new_in_memory().await.unwrap());
        let state = AppState::from_parts(config, database);
        Self {
            router: create_router(state.clone()),
            state,
            media,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        Response { status, headers, body }
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Register a user and issue an auth token for them
    async fn user(&self, username: &str, last_name: &str) -> (i64, String) {
        let user = self
            .state
            .users
            .register(CreateUserRequest {
                email: Some(format!("{}@example.com", username)),
                username: Some(username.to_string()),
                first_name: Some("Test".to_string()),
                last_name: Some(last_name.to_string()),
                password: Some("secret-password".to_string()),
            })
            .await
            .unwrap();

        let token = format!("token-{}", username);
        sqlx::query("INSERT INTO auth_tokens (key, user_id, created) VALUES (?, ?, 0)")
            .bind(&token)
            .bind(user.id)
            .execute(&self.state.database.pool)
            .await
            .unwrap();
        (user.id, token)
    }

    async fn ingredient(&self, name: &str, unit: &str) -> i64 {
        self.state.catalog.create_ingredient(name, unit).await.unwrap().id
    }

    async fn tag(&self, name: &str, color: &str, slug: &str) -> i64 {
        self.state.catalog.create_tag(name, color, slug).await.unwrap().id
    }

    async fn recipe(&self, token: &str, name: &str, tags: &[i64], ingredients: &[(i64, i64)]) -> i64 {
        let response = self
            .post("/api/recipes/", Some(token), recipe_body(name, tags, ingredients))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_i64().unwrap()
    }
}

fn recipe_body(name: &str, tags: &[i64], ingredients: &[(i64, i64)]) -> Value {
    json!({
        "name": name,
        "text": "Mix everything.",
        "cooking_time": 20,
        "image": PIXEL,
        "tags": tags,
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({"id": id, "amount": amount}))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_catalog_is_public() {
    let app = TestApp::new().await;
    app.ingredient("Salt", "g").await;
    app.ingredient("Sugar", "g").await;
    app.ingredient("Pepper", "g").await;
    let tag = app.tag("Breakfast", "#E26C2D", "breakfast").await;

    let response = app.get("/api/ingredients/?name=s", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<String> = response
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Salt", "Sugar"]);

    let response = app.get(&format!("/api/tags/{}/", tag), None).await;
    assert_eq!(response.json()["slug"], "breakfast");

    assert_eq!(app.get("/api/tags/999/", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/tags/abc/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::new().await;
    let response = app.get("/api/tags/", Some("nope")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_recipe() {
    let app = TestApp::new().await;
    let (anna_id, anna) = app.user("anna", "Ivanova").await;
    let salt = app.ingredient("Salt", "g").await;
    let flour = app.ingredient("Flour", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;

    let response = app
        .post("/api/recipes/", None, recipe_body("Bread", &[lunch], &[(salt, 10)]))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let id = app.recipe(&anna, "Bread", &[lunch], &[(flour, 500), (salt, 10)]).await;
    let recipe = app.get(&format!("/api/recipes/{}/", id), None).await.json();

    assert_eq!(recipe["name"], "Bread");
    assert_eq!(recipe["author"]["id"], anna_id);
    assert_eq!(recipe["author"]["is_subscribed"], false);
    assert_eq!(recipe["tags"][0]["slug"], "lunch");
    assert_eq!(recipe["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(recipe["ingredients"][0]["name"], "Flour");
    assert_eq!(recipe["ingredients"][0]["amount"], 500);
    assert_eq!(recipe["is_favorited"], false);

    let image = recipe["image"].as_str().unwrap();
    assert!(image.starts_with("/media/recipes/"), "{}", image);
    let stored = app.media.path().join(image.trim_start_matches("/media/"));
    assert!(stored.exists());

    let served = app.get(image, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(&served.body[1..4], b"PNG");
}

#[tokio::test]
async fn test_media_served_under_configured_url() {
    let app = TestApp::with_media_url("/static/uploads/").await;
    let (_, anna) = app.user("anna", "Ivanova").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;

    let id = app.recipe(&anna, "Bread", &[lunch], &[(salt, 10)]).await;
    let recipe = app.get(&format!("/api/recipes/{}/", id), None).await.json();
    let image = recipe["image"].as_str().unwrap();
    assert!(image.starts_with("/static/uploads/recipes/"), "{}", image);

    assert_eq!(app.get(image, None).await.status, StatusCode::OK);
    let default_path = image.replace("/static/uploads/", "/media/");
    assert_eq!(app.get(&default_path, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipe_validation() {
    let app = TestApp::new().await;
    let (_, anna) = app.user("anna", "Ivanova").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;

    let mut body = recipe_body("Soup", &[], &[(salt, 10)]);
    body["cooking_time"] = json!(0);
    let response = app.post("/api/recipes/", Some(&anna), body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let errors = response.json();
    assert!(errors["tags"].is_array());
    assert!(errors["cooking_time"].is_array());

    let response = app
        .post("/api/recipes/", Some(&anna), recipe_body("Soup", &[lunch, lunch], &[(salt, 10)]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["tags"].is_array());

    let response = app
        .post("/api/recipes/", Some(&anna), recipe_body("Soup", &[lunch], &[(salt, 0), (999, 1)]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["ingredients"].as_array().unwrap().len(), 2);

    let response = app
        .send(Method::POST, "/api/recipes/", Some(&anna), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let list = app.get("/api/recipes/", None).await.json();
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_update_replaces_links_and_checks_author() {
    let app = TestApp::new().await;
    let (_, anna) = app.user("anna", "Ivanova").await;
    let (_, boris) = app.user("boris", "Petrov").await;
    let salt = app.ingredient("Salt", "g").await;
    let flour = app.ingredient("Flour", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;
    let dinner = app.tag("Dinner", "#8775D2", "dinner").await;

    let id = app.recipe(&anna, "Bread", &[lunch], &[(flour, 500), (salt, 10)]).await;
    let uri = format!("/api/recipes/{}/", id);

    let patch = json!({"name": "Flatbread", "tags": [dinner], "ingredients": [{"id": salt, "amount": 5}]});

    let response = app.send(Method::PATCH, &uri, Some(&boris), Some(patch.clone())).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .send(Method::PATCH, &uri, Some(&anna), Some(json!({"name": "No links"})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["tags"].is_array());

    let response = app.send(Method::PATCH, &uri, Some(&anna), Some(patch)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let recipe = app.get(&uri, None).await.json();
    assert_eq!(recipe["name"], "Flatbread");
    assert_eq!(recipe["cooking_time"], 20);
    assert_eq!(recipe["tags"].as_array().unwrap().len(), 1);
    assert_eq!(recipe["tags"][0]["id"], dinner);
    assert_eq!(recipe["ingredients"].as_array().unwrap().len(), 1);
    assert_eq!(recipe["ingredients"][0]["amount"], 5);

    for relation in ["favorite", "shopping_cart"] {
        let response = app
            .post(&format!("/api/recipes/{}/{}/", id, relation), Some(&anna), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }
    let list = app.get("/api/recipes/download_shopping_cart/", Some(&anna)).await.text();
    assert!(list.contains("Salt (g) — 5"), "{}", list);

    assert_eq!(app.delete(&uri, Some(&boris)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.delete(&uri, Some(&anna)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);

    // Favorites, cart rows and ingredient links go with the recipe
    let favorites = app.get("/api/recipes/favorites/", Some(&anna)).await.json();
    assert!(favorites.as_array().unwrap().is_empty());
    let list = app.get("/api/recipes/download_shopping_cart/", Some(&anna)).await.text();
    assert_eq!(list, "Shopping list\n");

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipe_ingredients WHERE recipe_id = ?")
        .bind(id)
        .fetch_one(&app.state.database.pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}

#[tokio::test]
async fn test_favorite_toggle() {
    let app = TestApp::new().await;
    let (_, anna) = app.user("anna", "Ivanova").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;
    let id = app.recipe(&anna, "Soup", &[lunch], &[(salt, 10)]).await;
    let uri = format!("/api/recipes/{}/favorite/", id);

    assert_eq!(app.post(&uri, None, json!({})).await.status, StatusCode::UNAUTHORIZED);

    let response = app.post(&uri, Some(&anna), json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    let short = response.json();
    assert_eq!(short["name"], "Soup");
    assert_eq!(short["cooking_time"], 20);
    assert!(short.get("text").is_none());

    assert_eq!(app.post(&uri, Some(&anna), json!({})).await.status, StatusCode::BAD_REQUEST);
    let favorites = app.get("/api/recipes/favorites/", Some(&anna)).await.json();
    assert_eq!(favorites.as_array().unwrap().len(), 1);

    let recipe = app.get(&format!("/api/recipes/{}/", id), Some(&anna)).await.json();
    assert_eq!(recipe["is_favorited"], true);
    assert_eq!(recipe["is_in_shopping_cart"], false);

    let favorites = app.get("/api/recipes/favorites/", Some(&anna)).await.json();
    assert_eq!(favorites.as_array().unwrap().len(), 1);

    let filtered = app.get("/api/recipes/?is_favorited=1", Some(&anna)).await.json();
    assert_eq!(filtered["count"], 1);

    assert_eq!(app.delete(&uri, Some(&anna)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&uri, Some(&anna)).await.status, StatusCode::BAD_REQUEST);

    let filtered = app.get("/api/recipes/?is_favorited=1", Some(&anna)).await.json();
    assert_eq!(filtered["count"], 0);

    let missing = app.post("/api/recipes/999/favorite/", Some(&anna), json!({})).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shopping_list_download() {
    let app = TestApp::new().await;
    let (_, anna) = app.user("anna", "Ivanova").await;
    let flour = app.ingredient("Flour", "g").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;

    let bread = app.recipe(&anna, "Bread", &[lunch], &[(flour, 100), (salt, 10)]).await;
    let pie = app.recipe(&anna, "Pie", &[lunch], &[(flour, 50)]).await;

    for id in [bread, pie] {
        let response = app
            .post(&format!("/api/recipes/{}/shopping_cart/", id), Some(&anna), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = app.get("/api/recipes/download_shopping_cart/", Some(&anna)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"shopping_list.txt\""
    );

    let text = response.text();
    assert!(text.contains("Recipes: Bread, Pie"), "{}", text);
    assert!(text.contains("Flour (g) — 150"), "{}", text);
    assert!(text.contains("Salt (g) — 10"), "{}", text);
    assert_eq!(text.matches("Flour").count(), 1);

    let anonymous = app.get("/api/recipes/download_shopping_cart/", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_recipe_list_filters_and_pagination() {
    let app = TestApp::new().await;
    let (anna_id, anna) = app.user("anna", "Ivanova").await;
    let (_, boris) = app.user("boris", "Petrov").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;
    let dinner = app.tag("Dinner", "#8775D2", "dinner").await;

    for name in ["A", "B", "C"] {
        app.recipe(&anna, name, &[lunch], &[(salt, 1)]).await;
    }
    app.recipe(&boris, "D", &[dinner], &[(salt, 1)]).await;

    let page = app.get("/api/recipes/?limit=2", None).await.json();
    assert_eq!(page["count"], 4);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["name"], "A");
    assert_eq!(page["previous"], Value::Null);
    assert_eq!(page["next"], "/api/recipes/?limit=2&page=2");

    let last = app.get("/api/recipes/?limit=2&page=2", None).await.json();
    assert_eq!(last["next"], Value::Null);
    assert_eq!(last["previous"], "/api/recipes/?limit=2");

    assert_eq!(
        app.get("/api/recipes/?page=9", None).await.status,
        StatusCode::NOT_FOUND
    );
    for uri in [
        "/api/recipes/?page=9223372036854775807",
        "/api/users/?page=9223372036854775807&limit=100",
    ] {
        assert_eq!(app.get(uri, None).await.status, StatusCode::NOT_FOUND, "{}", uri);
    }
    let huge = app
        .get("/api/users/subscriptions/?page=9223372036854775807", Some(&anna))
        .await;
    assert_eq!(huge.status, StatusCode::NOT_FOUND);

    let by_author = app.get(&format!("/api/recipes/?author={}", anna_id), None).await.json();
    assert_eq!(by_author["count"], 3);

    let by_tags = app.get("/api/recipes/?tags=dinner&tags=lunch", None).await.json();
    assert_eq!(by_tags["count"], 4);
    let by_tag = app.get("/api/recipes/?tags=dinner", None).await.json();
    assert_eq!(by_tag["count"], 1);
    assert_eq!(by_tag["results"][0]["name"], "D");

    // Viewer-relative flags mean nothing without a viewer
    let anonymous = app.get("/api/recipes/?is_in_shopping_cart=1", None).await.json();
    assert_eq!(anonymous["count"], 4);
}

#[tokio::test]
async fn test_users_and_subscriptions() {
    let app = TestApp::new().await;
    let (anna_id, anna) = app.user("anna", "Ivanova").await;
    let (boris_id, boris) = app.user("boris", "Abramov").await;
    let salt = app.ingredient("Salt", "g").await;
    let lunch = app.tag("Lunch", "#49B64E", "lunch").await;
    for name in ["Borscht", "Kasha"] {
        app.recipe(&boris, name, &[lunch], &[(salt, 1)]).await;
    }

    let response = app
        .post(
            "/api/users/",
            None,
            json!({
                "email": "vera@example.com",
                "username": "vera",
                "first_name": "Vera",
                "last_name": "Zueva",
                "password": "secret-password"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.json().get("password").is_none());

    let users = app.get("/api/users/", None).await.json();
    assert_eq!(users["count"], 3);
    assert_eq!(users["results"][0]["username"], "boris");

    let me = app.get("/api/users/me/", Some(&anna)).await;
    assert_eq!(me.json()["id"], anna_id);
    assert_eq!(app.get("/api/users/me/", None).await.status, StatusCode::UNAUTHORIZED);

    let own = app.post(&format!("/api/users/{}/subscribe/", anna_id), Some(&anna), json!({})).await;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/users/{}/subscribe/?recipes_limit=1", boris_id);
    let response = app.post(&uri, Some(&anna), json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED);
    let subscription = response.json();
    assert_eq!(subscription["username"], "boris");
    assert_eq!(subscription["is_subscribed"], true);
    assert_eq!(subscription["recipes_count"], 2);
    assert_eq!(subscription["recipes"].as_array().unwrap().len(), 1);
    assert_eq!(subscription["recipes"][0]["name"], "Borscht");

    assert_eq!(app.post(&uri, Some(&anna), json!({})).await.status, StatusCode::BAD_REQUEST);

    let profile = app.get(&format!("/api/users/{}/", boris_id), Some(&anna)).await.json();
    assert_eq!(profile["is_subscribed"], true);

    let subscriptions = app.get("/api/users/subscriptions/", Some(&anna)).await.json();
    assert_eq!(subscriptions["count"], 1);
    assert_eq!(subscriptions["results"][0]["recipes"].as_array().unwrap().len(), 2);

    let unsubscribe = format!("/api/users/{}/subscribe/", boris_id);
    assert_eq!(app.delete(&unsubscribe, Some(&anna)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&unsubscribe, Some(&anna)).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.delete("/api/users/999/subscribe/", Some(&anna)).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_set_password() {
    let app = TestApp::new().await;
    let (_, anna) = app.user("anna", "Ivanova").await;

    let wrong = app
        .post(
            "/api/users/set_password/",
            Some(&anna),
            json!({"new_password": "fresh-password", "current_password": "nope"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let ok = app
        .post(
            "/api/users/set_password/",
            Some(&anna),
            json!({"new_password": "fresh-password", "current_password": "secret-password"}),
        )
        .await;
    assert_eq!(ok.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let app = TestApp::new().await;
    app.user("anna", "Ivanova").await;

    let response = app
        .post(
            "/api/users/",
            None,
            json!({
                "email": "anna@example.com",
                "username": "anna2",
                "first_name": "Anna",
                "last_name": "Ivanova",
                "password": "secret-password"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["email"].is_array());

    let response = app
        .post(
            "/api/users/",
            None,
            json!({"email": "x@example.com", "username": "me", "first_name": "A", "last_name": "B", "password": "p"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["username"].is_array());
}
