use rand::Rng;
use serde::{Deserialize, Serialize};

/// Generate a 24-character hex identifier: 4 bytes of big-endian unix seconds
/// followed by 8 random bytes, so ids sort roughly by creation time.
#[must_use]
pub fn new_object_id() -> String {
    let secs = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    rand::thread_rng().fill(&mut bytes[4..]);
    hex::encode(bytes)
}

/// A registered user profile.
///
/// `posts` holds the image URLs of the user's posts in creation order. It
/// duplicates the posts table and is what index-based like addressing and
/// per-user post counts read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "userAvatarURL")]
    pub user_avatar_url: String,
    #[sqlx(json)]
    pub posts: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Data for inserting a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub user_avatar_url: String,
}

/// A post with its image and engagement.
///
/// `user_name` and `user_avatar_url` are copied from the owner when the post
/// is created and are not refreshed when the profile changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "userAvatarURL")]
    pub user_avatar_url: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "postImgURL")]
    pub post_img_url: String,
    #[sqlx(json)]
    pub likes: Vec<String>,
    #[sqlx(json)]
    pub comments: Vec<serde_json::Value>,
    #[serde(rename = "isPrivate")]
    pub is_private: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// Data for inserting a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar_url: String,
    pub title: String,
    pub description: String,
    pub post_img_url: String,
    pub is_private: bool,
}

/// Partial update of a post. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl PostUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_private.is_none()
    }
}
