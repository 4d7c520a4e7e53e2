mod common;

use common::{create_recipe, names, sample_recipe, TestApp};
use serde_json::json;
use warp::http::StatusCode;

const RECIPES: &str = "/api/recipe/recipes/";

fn detail(id: i64) -> String {
    format!("/api/recipe/recipes/{id}/")
}

#[tokio::test]
async fn recipes_require_authentication() {
    let app = TestApp::new();

    let anonymous = app.send(warp::test::request().method("GET").path(RECIPES)).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert!(anonymous.body["detail"].is_string());

    let forged = app.get(RECIPES, "not-a-token").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let malformed = app
        .send(
            warp::test::request()
                .method("GET")
                .path(RECIPES)
                .header("authorization", "Basic abc"),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_and_token_scheme_authenticate() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let cookie = app
        .send(
            warp::test::request()
                .method("GET")
                .path(RECIPES)
                .header("cookie", format!("session={token}")),
        )
        .await;
    assert_eq!(cookie.status, StatusCode::OK);

    let scheme = app
        .send(
            warp::test::request()
                .method("GET")
                .path(RECIPES)
                .header("authorization", format!("Token {token}")),
        )
        .await;
    assert_eq!(scheme.status, StatusCode::OK);
}

#[tokio::test]
async fn create_stores_every_field_for_the_caller() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let response = app.post(RECIPES, &token, sample_recipe()).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["title"], "Sample recipe");
    assert_eq!(response.body["description"], "Sample description");
    assert_eq!(response.body["time_minutes"], 22);
    assert_eq!(response.body["price"], "5.25");
    assert_eq!(response.body["link"], "https://example.com/recipe.pdf");
    assert!(response.body["image"].is_null());
    assert!(response.body.get("user").is_none());

    let id = response.body["id"].as_i64().unwrap();
    let fetched = app.get(&detail(id), &token).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, response.body);
}

#[tokio::test]
async fn create_with_missing_fields_is_rejected() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let response = app.post(RECIPES, &token, json!({ "description": "No title" })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["title"].is_array());
    assert!(response.body["time_minutes"].is_array());
    assert!(response.body["price"].is_array());
    assert!(app.get(RECIPES, &token).await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let response = app
        .send(
            common::authorized(&token)
                .method("POST")
                .path(RECIPES)
                .header("content-type", "application/json")
                .body("{\"title\": "),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["non_field_errors"].is_array());
}

#[tokio::test]
async fn list_is_newest_first_in_summary_shape() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let first = create_recipe(&app, &token, sample_recipe()).await;
    let second = create_recipe(
        &app,
        &token,
        json!({ "title": "Second", "time_minutes": 5, "price": "1.00" }),
    )
    .await;

    let response = app.get(RECIPES, &token).await;
    let recipes = response.body.as_array().unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0]["id"].as_i64(), Some(second));
    assert_eq!(recipes[1]["id"].as_i64(), Some(first));
    assert!(recipes[0].get("description").is_none());
    assert!(recipes[0].get("image").is_none());
    assert!(recipes[0]["tags"].is_array());
}

#[tokio::test]
async fn other_users_recipes_are_not_found() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com").await;
    let (_, stranger) = app.user("stranger@example.com").await;
    let id = create_recipe(&app, &owner, sample_recipe()).await;

    assert!(app.get(RECIPES, &stranger).await.body.as_array().unwrap().is_empty());
    assert_eq!(app.get(&detail(id), &stranger).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.put(&detail(id), &stranger, sample_recipe()).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.patch(&detail(id), &stranger, json!({ "title": "Mine now" }))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete(&detail(id), &stranger).await.status, StatusCode::NOT_FOUND);

    let kept = app.get(&detail(id), &owner).await;
    assert_eq!(kept.status, StatusCode::OK);
    assert_eq!(kept.body["title"], "Sample recipe");
}

#[tokio::test]
async fn unknown_paths_ids_and_methods() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    assert_eq!(app.get(&detail(999), &token).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/api/recipe/recipes/abc/", &token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/api/recipe/unknown/", &token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(RECIPES, &token).await.status,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn new_tags_are_created_and_existing_ones_reused() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Tag1" }, { "name": "Tag2" }]);
    let response = app.post(RECIPES, &token, payload).await;
    assert_eq!(names(&response.body, "tags"), vec!["Tag1", "Tag2"]);
    assert_eq!(
        app.get("/api/recipe/tags/", &token).await.body.as_array().unwrap().len(),
        2
    );

    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Tag1" }, { "name": "Tag3" }, { "name": "Tag3" }]);
    let response = app.post(RECIPES, &token, payload).await;
    assert_eq!(names(&response.body, "tags"), vec!["Tag1", "Tag3"]);

    let tags = app.get("/api/recipe/tags/", &token).await;
    assert_eq!(tags.body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn ingredients_resolve_per_user() {
    let app = TestApp::new();
    let (_, alice) = app.user("alice@example.com").await;
    let (_, bob) = app.user("bob@example.com").await;

    let mut payload = sample_recipe();
    payload["ingredients"] = json!([{ "name": "Salt" }]);
    let theirs = app.post(RECIPES, &alice, payload.clone()).await;
    let mine = app.post(RECIPES, &bob, payload).await;

    assert_ne!(
        theirs.body["ingredients"][0]["id"],
        mine.body["ingredients"][0]["id"]
    );
    assert_eq!(
        app.get("/api/recipe/ingredients/", &bob)
            .await
            .body
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn empty_list_clears_and_absent_list_keeps_associations() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Breakfast" }]);
    payload["ingredients"] = json!([{ "name": "Egg" }]);
    let id = create_recipe(&app, &token, payload).await;

    let untouched = app.patch(&detail(id), &token, json!({ "title": "Eggs" })).await;
    assert_eq!(untouched.status, StatusCode::OK);
    assert_eq!(names(&untouched.body, "tags"), vec!["Breakfast"]);
    assert_eq!(names(&untouched.body, "ingredients"), vec!["Egg"]);

    let cleared = app.patch(&detail(id), &token, json!({ "tags": [] })).await;
    assert!(names(&cleared.body, "tags").is_empty());
    assert_eq!(names(&cleared.body, "ingredients"), vec!["Egg"]);

    let tags = app.get("/api/recipe/tags/", &token).await;
    assert_eq!(tags.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn partial_update_changes_only_supplied_fields() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let id = create_recipe(&app, &token, sample_recipe()).await;

    let response = app
        .patch(&detail(id), &token, json!({ "title": "New title", "price": 7 }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "New title");
    assert_eq!(response.body["price"], "7.00");
    assert_eq!(response.body["description"], "Sample description");
    assert_eq!(response.body["time_minutes"], 22);
}

#[tokio::test]
async fn full_update_replaces_fields_and_requires_them() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Dinner" }]);
    let id = create_recipe(&app, &token, payload).await;

    let incomplete = app.put(&detail(id), &token, json!({ "title": "Only title" })).await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);
    assert!(incomplete.body["price"].is_array());

    let response = app
        .put(
            &detail(id),
            &token,
            json!({
                "title": "Spaghetti",
                "description": "Carbonara",
                "time_minutes": 25,
                "price": "5.00",
                "link": "https://example.com/spaghetti",
                "tags": [],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Spaghetti");
    assert_eq!(response.body["description"], "Carbonara");
    assert_eq!(response.body["time_minutes"], 25);
    assert!(names(&response.body, "tags").is_empty());
}

#[tokio::test]
async fn owner_cannot_be_changed_by_update() {
    let app = TestApp::new();
    let (owner, owner_token) = app.user("owner@example.com").await;
    let (other, other_token) = app.user("other@example.com").await;
    let id = create_recipe(&app, &owner_token, sample_recipe()).await;

    let response = app
        .patch(&detail(id), &owner_token, json!({ "user": other.id }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.get(&detail(id), &owner_token).await.status, StatusCode::OK);
    assert_eq!(
        app.get(&detail(id), &other_token).await.status,
        StatusCode::NOT_FOUND
    );
    assert!(app.stored_image(owner.id, id as i32).await.is_none());
}

#[tokio::test]
async fn invalid_values_are_reported_per_field() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let mut payload = sample_recipe();
    payload["price"] = json!("1000.00");
    payload["title"] = json!("   ");
    let response = app.post(RECIPES, &token, payload).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["price"].is_array());
    assert!(response.body["title"].is_array());
}

#[tokio::test]
async fn wrongly_typed_values_get_field_errors() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;

    let mut payload = sample_recipe();
    payload["time_minutes"] = json!("abc");
    payload["price"] = json!("x");
    payload["tags"] = json!("Tag1");
    let response = app.post(RECIPES, &token, payload).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["time_minutes"], json!(["A valid integer is required."]));
    assert_eq!(response.body["price"], json!(["A valid number is required."]));
    assert_eq!(
        response.body["tags"],
        json!(["Expected a list of items but got type \"str\"."])
    );
    assert!(response.body.get("non_field_errors").is_none());
    assert!(app.get(RECIPES, &token).await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn null_tags_are_rejected_and_keep_associations() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Tag1" }]);
    let id = create_recipe(&app, &token, payload).await;

    let response = app.patch(&detail(id), &token, json!({ "tags": null })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["tags"], json!(["This field may not be null."]));
    let current = app.get(&detail(id), &token).await;
    assert_eq!(names(&current.body, "tags"), vec!["Tag1"]);
}

#[tokio::test]
async fn delete_removes_recipe_but_keeps_labels() {
    let app = TestApp::new();
    let (_, token) = app.user("cook@example.com").await;
    let mut payload = sample_recipe();
    payload["tags"] = json!([{ "name": "Lunch" }]);
    let id = create_recipe(&app, &token, payload).await;

    let response = app.delete(&detail(id), &token).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_null());

    assert_eq!(app.get(&detail(id), &token).await.status, StatusCode::NOT_FOUND);
    let tags = app.get("/api/recipe/tags/", &token).await;
    assert_eq!(tags.body.as_array().unwrap().len(), 1);
}
