//! Integration tests for the HTTP routes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{seed_user, setup_db, FakeMediaStore, PNG_DATA_URL};
use serde_json::{json, Value};
use social_posts::config::Config;
use social_posts::db::Database;
use social_posts::web::{create_app, AppState};
use tower::ServiceExt;

fn create_test_app(db: &Database, media: &FakeMediaStore) -> Router {
    let state = AppState::new(Config::for_testing(), db.clone(), Arc::new(media.clone()));
    create_app(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create_post(app: &Router, user_id: &str, title: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        &format!("/posts/{user_id}"),
        Some(json!({
            "postImgURL": PNG_DATA_URL,
            "title": title,
            "description": format!("{title} description"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    tokio::time::sleep(Duration::from_millis(3)).await;
    body
}

#[tokio::test]
async fn test_healthz() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());

    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_create_post_response_shape() {
    let (db, _temp_dir) = setup_db().await;
    let media = FakeMediaStore::new();
    let app = create_test_app(&db, &media);
    let mira = seed_user(&db, "mira").await;

    let body = create_post(&app, &mira, "Harbour").await;

    let post_url = body["postURL"].as_str().unwrap();
    let post = &body["post"];
    assert_eq!(post["postImgURL"], post_url);
    assert_eq!(post["userId"], mira.as_str());
    assert_eq!(post["userName"], "mira");
    assert_eq!(post["userAvatarURL"], "https://avatars.test/mira.png");
    assert_eq!(post["title"], "Harbour");
    assert_eq!(post["isPrivate"], false);
    assert_eq!(post["likes"], json!([]));
    assert_eq!(post["comments"], json!([]));
    assert_eq!(post["_id"].as_str().unwrap().len(), 24);
    assert_eq!(media.object_count(), 1);
}

#[tokio::test]
async fn test_create_post_accepts_image_list() {
    let (db, _temp_dir) = setup_db().await;
    let media = FakeMediaStore::new();
    let app = create_test_app(&db, &media);
    let mira = seed_user(&db, "mira").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/posts/{mira}"),
        Some(json!({
            "postImgURL": [PNG_DATA_URL, "data:image/png;base64,AAAA"],
            "title": "List",
            "description": "first entry wins",
            "isPrivate": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["isPrivate"], true);
    assert_eq!(media.upload_calls(), 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/posts/{mira}"),
        Some(json!({ "postImgURL": [], "title": "Empty" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_create_post_errors() {
    let (db, _temp_dir) = setup_db().await;
    let media = FakeMediaStore::new();
    let app = create_test_app(&db, &media);
    let mira = seed_user(&db, "mira").await;

    let (status, body) = send(
        &app,
        "POST",
        "/posts/000000000000000000000000",
        Some(json!({ "postImgURL": PNG_DATA_URL, "title": "t", "description": "d" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/posts/{mira}"),
        Some(json!({ "postImgURL": "not a data url", "title": "t", "description": "d" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(media.upload_calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());
    let mira = seed_user(&db, "mira").await;

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/posts/{mira}"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // postId is required for updates
    let (status, body) = send(&app, "PATCH", &format!("/posts/{mira}"), Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_list_posts() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());
    let mira = seed_user(&db, "mira").await;
    let theo = seed_user(&db, "theo").await;

    create_post(&app, &mira, "One").await;
    create_post(&app, &theo, "Two").await;

    let (status, body) = send(&app, "GET", &format!("/posts/{mira}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "One");

    let (status, body) = send(&app, "GET", "/posts/000000000000000000000000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"], json!([]));

    // Listing everything answers 201
    let (status, body) = send(&app, "GET", "/posts", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_post() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());
    let mira = seed_user(&db, "mira").await;

    let created = create_post(&app, &mira, "Harbour").await;
    let post_id = created["post"]["_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/posts/{mira}"),
        Some(json!({ "postId": post_id, "description": "At noon", "isPrivate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Harbour");
    assert_eq!(body["description"], "At noon");
    assert_eq!(body["isPrivate"], true);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/posts/{mira}"),
        Some(json!({ "postId": "000000000000000000000000", "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, body) = send(
        &app,
        "PATCH",
        "/posts/000000000000000000000000",
        Some(json!({ "postId": post_id, "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_toggle_like() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());
    let mira = seed_user(&db, "mira").await;
    let theo = seed_user(&db, "theo").await;

    create_post(&app, &mira, "Harbour").await;
    let uri = format!("/posts/like/{mira}");

    let (status, body) = send(&app, "PATCH", &uri, Some(json!({ "postIndex": 0, "userId": theo }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLiked"], true);

    let (_, body) = send(&app, "GET", &format!("/posts/{mira}"), None).await;
    assert_eq!(body["posts"][0]["likes"], json!([theo]));

    let (status, body) = send(&app, "PATCH", &uri, Some(json!({ "postIndex": 0, "userId": theo }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLiked"], false);

    let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "postIndex": 3, "userId": theo }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "userId": theo }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for index in [json!(-1), json!(0.5), json!("0")] {
        let (status, body) =
            send(&app, "PATCH", &uri, Some(json!({ "postIndex": index, "userId": theo }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "postIndex {index}");
        assert_eq!(body["message"], "Post not found");
    }
}

#[tokio::test]
async fn test_delete_post() {
    let (db, _temp_dir) = setup_db().await;
    let media = FakeMediaStore::new();
    let app = create_test_app(&db, &media);
    let mira = seed_user(&db, "mira").await;

    let created = create_post(&app, &mira, "Harbour").await;
    let post_id = created["post"]["_id"].as_str().unwrap();
    let post_url = created["postURL"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/posts/{mira}/{post_id}"),
        Some(json!({ "postImgURL": post_url })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post Deletion Successful");
    assert_eq!(media.object_count(), 0);

    let (_, body) = send(&app, "GET", &format!("/posts/{mira}"), None).await;
    assert_eq!(body["posts"], json!([]));

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/posts/{mira}/{post_id}"),
        Some(json!({ "postImgURL": post_url })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");
}

#[tokio::test]
async fn test_user_profile_and_search() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(&db, &FakeMediaStore::new());
    let mira = seed_user(&db, "mira").await;
    seed_user(&db, "miranda").await;
    seed_user(&db, "theo").await;

    create_post(&app, &mira, "One").await;
    create_post(&app, &mira, "Two").await;

    let (status, body) = send(&app, "GET", &format!("/users/{mira}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["userName"], "mira");
    assert_eq!(body["user"]["_id"], mira.as_str());
    assert_eq!(body["postCount"], 2);

    let (status, body) = send(&app, "GET", "/users/000000000000000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, body) = send(&app, "GET", "/users?search=MIR", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["userName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["mira", "miranda"]);

    let (status, body) = send(&app, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], json!([]));
}
