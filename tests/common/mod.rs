#![allow(dead_code)]

use std::{io::Cursor, sync::Arc};

use image::{ImageFormat, Rgb, RgbImage};
use recipe_backend::{
    actions,
    jwt::{generate_jwt_session, SessionKeys},
    memory::MemoryStore,
    routes,
    schema::User,
    store::{Store, StoreTx},
    AppState, MediaStore,
};
use serde_json::Value;
use tempfile::TempDir;
use warp::http::StatusCode;

pub const BOUNDARY: &str = "recipe-test-boundary";

pub struct TestApp {
    pub state: Arc<AppState<MemoryStore>>,
    pub media_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(10 * 1024 * 1024)
    }

    pub fn with_upload_limit(upload_limit: u64) -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(media_dir.path(), "/static/media");
        let keys = SessionKeys::new("test secret", 1).unwrap();
        let state = AppState::new(MemoryStore::new(), media, keys, upload_limit);

        Self { state, media_dir }
    }

    /// Creates a user and returns it with a valid session token.
    pub async fn user(&self, email: &str) -> (User, String) {
        let mut tx = self.state.store.begin().await.unwrap();
        let user = actions::create_user(&mut tx, email, "Test User", "testpass123")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let token = generate_jwt_session(&self.state.keys, &user).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: warp::test::RequestBuilder) -> TestResponse {
        let response = request.reply(&routes(self.state.clone())).await;
        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap_or(Value::Null)
        };

        TestResponse {
            status: response.status(),
            body,
        }
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.send(authorized(token).method("GET").path(path)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> TestResponse {
        self.send(authorized(token).method("DELETE").path(path)).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.send(authorized(token).method("POST").path(path).json(&body))
            .await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.send(authorized(token).method("PUT").path(path).json(&body))
            .await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.send(authorized(token).method("PATCH").path(path).json(&body))
            .await
    }

    pub async fn upload(&self, path: &str, token: &str, field: &str, bytes: &[u8]) -> TestResponse {
        self.send(
            authorized(token)
                .method("POST")
                .path(path)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(multipart_body(field, bytes)),
        )
        .await
    }

    /// The image path currently stored on a recipe, read straight from the store.
    pub async fn stored_image(&self, owner: i32, recipe_id: i32) -> Option<String> {
        let mut tx = self.state.store.begin().await.unwrap();
        tx.find_recipe(owner, recipe_id).await.unwrap().unwrap().image
    }

    pub fn media(&self) -> &MediaStore {
        &self.state.media
    }
}

pub fn authorized(token: &str) -> warp::test::RequestBuilder {
    warp::test::request().header("authorization", format!("Bearer {token}"))
}

pub fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn sample_image(format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(10, 10, Rgb([120, 180, 60]))
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn sample_recipe() -> Value {
    serde_json::json!({
        "title": "Sample recipe",
        "description": "Sample description",
        "time_minutes": 22,
        "price": "5.25",
        "link": "https://example.com/recipe.pdf",
    })
}

pub async fn create_recipe(app: &TestApp, token: &str, body: Value) -> i64 {
    let response = app.post("/api/recipe/recipes/", token, body).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

    response.body["id"].as_i64().unwrap()
}

pub fn names(body: &Value, key: &str) -> Vec<String> {
    body[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}
