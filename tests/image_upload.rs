mod common;

use common::{create_recipe, sample_image, sample_recipe, TestApp};
use image::ImageFormat;
use warp::http::StatusCode;

fn upload_path(id: i64) -> String {
    format!("/api/recipe/recipes/{id}/upload-image/")
}

/// Strips the public prefix to get the path relative to the media root.
fn relative(url: &str) -> &str {
    url.trim_start_matches("/static/media/")
}

#[tokio::test]
async fn uploading_an_image_stores_it_and_returns_its_url() {
    let app = TestApp::new();
    let (user, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;

    let response = app
        .upload(&upload_path(id), &token, "image", &sample_image(ImageFormat::Png))
        .await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["id"].as_i64(), Some(id));
    let url = response.body["image"].as_str().unwrap();
    assert!(url.starts_with("/static/media/uploads/recipe/"));
    assert!(url.ends_with(".png"));
    assert!(app.media().path(relative(url)).exists());
    assert_eq!(
        app.stored_image(user.id, id as i32).await.as_deref(),
        Some(relative(url))
    );

    let detail = app.get(&format!("/api/recipe/recipes/{id}/"), &token).await;
    assert_eq!(detail.body["image"], url);

    let served = warp::test::request()
        .method("GET")
        .path(url)
        .reply(&recipe_backend::routes(app.state.clone()))
        .await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.body().as_ref(), sample_image(ImageFormat::Png).as_slice());
}

#[tokio::test]
async fn a_new_upload_replaces_the_previous_image() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;

    let first = app
        .upload(&upload_path(id), &token, "image", &sample_image(ImageFormat::Png))
        .await;
    let first_url = first.body["image"].as_str().unwrap().to_string();

    let second = app
        .upload(&upload_path(id), &token, "image", &sample_image(ImageFormat::Jpeg))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let second_url = second.body["image"].as_str().unwrap();

    assert!(second_url.ends_with(".jpg"));
    assert!(!app.media().path(relative(&first_url)).exists());
    assert!(app.media().path(relative(second_url)).exists());
}

#[tokio::test]
async fn invalid_payload_is_rejected_and_leaves_the_recipe_alone() {
    let app = TestApp::new();
    let (user, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;
    app.upload(&upload_path(id), &token, "image", &sample_image(ImageFormat::Png))
        .await;
    let before = app.stored_image(user.id, id as i32).await;

    let response = app
        .upload(&upload_path(id), &token, "image", b"notanimage")
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["image"].is_array());
    assert_eq!(app.stored_image(user.id, id as i32).await, before);
}

#[tokio::test]
async fn missing_image_field_is_a_validation_error() {
    let app = TestApp::new();
    let (user, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;

    let response = app
        .upload(&upload_path(id), &token, "photo", &sample_image(ImageFormat::Png))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["image"].is_array());
    assert!(app.stored_image(user.id, id as i32).await.is_none());
}

#[tokio::test]
async fn uploads_to_other_users_recipes_are_not_found() {
    let app = TestApp::new();
    let (owner, owner_token) = app.user("owner@example.com").await;
    let (_, stranger) = app.user("stranger@example.com").await;
    let id = create_recipe(&app, &owner_token, sample_recipe()).await;

    let response = app
        .upload(&upload_path(id), &stranger, "image", &sample_image(ImageFormat::Png))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(app.stored_image(owner.id, id as i32).await.is_none());
}

#[tokio::test]
async fn oversized_uploads_are_refused() {
    let app = TestApp::with_upload_limit(64);
    let (user, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;

    let response = app
        .upload(&upload_path(id), &token, "image", &[0u8; 1024])
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.stored_image(user.id, id as i32).await.is_none());
}

#[tokio::test]
async fn deleting_a_recipe_removes_its_image() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;
    let uploaded = app
        .upload(&upload_path(id), &token, "image", &sample_image(ImageFormat::Png))
        .await;
    let url = uploaded.body["image"].as_str().unwrap().to_string();

    let response = app
        .delete(&format!("/api/recipe/recipes/{id}/"), &token)
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(!app.media().path(relative(&url)).exists());
}
