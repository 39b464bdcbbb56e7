use axum::extract::{FromRequest, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::db::{get_user, search_users, PostUpdate};
use crate::error::{ApiError, ApiResult};
use crate::posts::{CreatePostInput, PostRef};

/// Maximum number of users returned by a name search.
const USER_SEARCH_LIMIT: i64 = 20;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_all_posts))
        .route("/posts/like/:user_id", patch(toggle_like))
        .route(
            "/posts/:user_id",
            get(list_user_posts).post(create_post).patch(update_post),
        )
        .route("/posts/:user_id/:post_id", delete(delete_post))
        .route("/users", get(find_users))
        .route("/users/:user_id", get(user_profile))
        .route("/healthz", get(health))
}

/// JSON body extractor whose rejections render like every other API error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

// ========== Posts ==========

/// `postImgURL` arrives as a single data URL or as a list whose first entry is used.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageField {
    One(String),
    Many(Vec<String>),
}

impl ImageField {
    fn into_first(self) -> Option<String> {
        match self {
            Self::One(url) => Some(url),
            Self::Many(urls) => urls.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostBody {
    #[serde(rename = "postImgURL")]
    post_img_url: ImageField,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_private: bool,
}

async fn create_post(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    JsonBody(body): JsonBody<CreatePostBody>,
) -> Response {
    let Some(image_data_url) = body.post_img_url.into_first() else {
        return ApiError::Conflict("No image provided".to_string()).into_response();
    };

    let input = CreatePostInput {
        image_data_url,
        title: body.title,
        description: body.description,
        is_private: body.is_private,
    };

    match state.posts.create_post(&user_id, input).await {
        Ok(created) => Json(created).into_response(),
        Err(e) => e.into_conflict().into_response(),
    }
}

async fn list_user_posts(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match state.posts.get_user_posts(&user_id).await {
        Ok(posts) => Json(json!({ "posts": posts })).into_response(),
        Err(e) => e.into_not_found().into_response(),
    }
}

async fn list_all_posts(State(state): State<AppState>) -> Response {
    match state.posts.get_all_posts().await {
        Ok(posts) => (StatusCode::CREATED, Json(posts)).into_response(),
        Err(e) => e.into_not_found().into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePostBody {
    post_id: String,
    title: Option<String>,
    description: Option<String>,
    is_private: Option<bool>,
}

async fn update_post(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    JsonBody(body): JsonBody<UpdatePostBody>,
) -> ApiResult<Response> {
    let update = PostUpdate {
        title: body.title,
        description: body.description,
        is_private: body.is_private,
    };

    let post = state.posts.update_post(&user_id, &body.post_id, update).await?;
    Ok(Json(post).into_response())
}

#[derive(Debug, Deserialize)]
struct DeletePostBody {
    #[serde(rename = "postImgURL")]
    post_img_url: String,
}

async fn delete_post(
    State(state): State<AppState>,
    Path((user_id, post_id)): Path<(String, String)>,
    JsonBody(body): JsonBody<DeletePostBody>,
) -> ApiResult<Response> {
    state
        .posts
        .delete_post(&user_id, &post_id, &body.post_img_url)
        .await?;

    Ok(Json(json!({ "message": "Post Deletion Successful" })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleLikeBody {
    /// Kept loose so a negative or fractional index is a missing post, not a bad body.
    post_index: Option<serde_json::Value>,
    post_id: Option<String>,
    /// The user doing the liking, not the profile owner in the path.
    user_id: String,
}

async fn toggle_like(
    State(state): State<AppState>,
    Path(profile_user_id): Path<String>,
    JsonBody(body): JsonBody<ToggleLikeBody>,
) -> Response {
    let target = match (body.post_id, body.post_index) {
        (Some(id), _) => PostRef::Id(id),
        (None, Some(index)) => match index.as_u64().and_then(|i| usize::try_from(i).ok()) {
            Some(index) => PostRef::Index(index),
            None => return ApiError::post_not_found().into_response(),
        },
        (None, None) => return ApiError::post_not_found().into_response(),
    };

    match state
        .posts
        .toggle_like(&profile_user_id, target, &body.user_id)
        .await
    {
        Ok(is_liked) => Json(json!({ "isLiked": is_liked })).into_response(),
        Err(e) => e.into_not_found().into_response(),
    }
}

// ========== Users ==========

async fn user_profile(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match get_user(state.db.pool(), &user_id).await {
        Ok(Some(user)) => {
            let post_count = user.posts.len();
            Json(json!({ "user": user, "postCount": post_count })).into_response()
        }
        Ok(None) => ApiError::user_not_found().into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct UserSearchParams {
    search: Option<String>,
}

async fn find_users(State(state): State<AppState>, Query(params): Query<UserSearchParams>) -> Response {
    let text = params.search.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Json(json!({ "users": [] })).into_response();
    }

    match search_users(state.db.pool(), text, USER_SEARCH_LIMIT).await {
        Ok(users) => Json(json!({ "users": users })).into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

async fn health() -> &'static str {
    "OK"
}
