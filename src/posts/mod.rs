//! Post orchestration over the document store and the media host.
//!
//! Each operation is a sequence of awaited store calls. Apart from the like
//! toggle, nothing spans a transaction: a failure part-way through leaves the
//! earlier steps committed. In particular, delete removes the owner's image
//! reference before it knows whether the post exists, and an upload whose
//! post insert fails leaves the image orphaned on the media host.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{self, Database, NewPost, Post, PostUpdate};
use crate::error::{ApiError, ApiResult};
use crate::media::{ImagePayload, MediaStore};

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    /// Base64 `data:` URL of the image.
    pub image_data_url: String,
    pub title: String,
    pub description: String,
    pub is_private: bool,
}

/// A freshly created post and the URL its image was stored at.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPost {
    #[serde(rename = "postURL")]
    pub post_url: String,
    pub post: Post,
}

/// How a like request names its post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRef {
    /// Position in the profile owner's post-reference list.
    Index(usize),
    /// Direct post ID.
    Id(String),
}

#[derive(Clone)]
pub struct PostService {
    db: Database,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    #[must_use]
    pub fn new(db: Database, media: Arc<dyn MediaStore>) -> Self {
        Self { db, media }
    }

    /// Upload the image, persist the post and append its image URL to the
    /// owner's post-reference list.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user, `Conflict` for a rejected image, and
    /// `Internal` when the media host or the database fails.
    pub async fn create_post(&self, user_id: &str, input: CreatePostInput) -> ApiResult<CreatedPost> {
        let pool = self.db.pool();

        let user = db::get_user(pool, user_id)
            .await?
            .ok_or_else(ApiError::user_not_found)?;

        let image = ImagePayload::from_data_url(&input.image_data_url)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;

        let key = format!("{user_id}_{}", chrono::Utc::now().timestamp_millis());
        let uploaded = self
            .media
            .upload(&key, &image)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Image upload failed: {e}")))?;

        let new_post = NewPost {
            user_id: user.id.clone(),
            user_name: user.user_name.clone(),
            user_avatar_url: user.user_avatar_url.clone(),
            title: input.title,
            description: input.description,
            post_img_url: uploaded.url.clone(),
            is_private: input.is_private,
        };

        if let Err(e) = db::insert_post(pool, &new_post).await {
            warn!(
                user_id = %user_id,
                public_id = %uploaded.public_id,
                "Post insert failed after upload; image is orphaned"
            );
            return Err(e.into());
        }

        if !db::append_user_post(pool, user_id, &uploaded.url).await? {
            warn!(user_id = %user_id, "User vanished before post reference was recorded");
        }

        let post = db::get_post_by_owner_and_image(pool, user_id, &uploaded.url)
            .await?
            .ok_or_else(|| ApiError::Conflict("Post was not persisted".to_string()))?;

        info!(user_id = %user_id, post_id = %post.id, "Created post");

        Ok(CreatedPost {
            post_url: uploaded.url,
            post,
        })
    }

    /// All posts owned by a user, regardless of visibility.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the query fails.
    pub async fn get_user_posts(&self, user_id: &str) -> ApiResult<Vec<Post>> {
        Ok(db::get_posts_by_user(self.db.pool(), user_id).await?)
    }

    /// Every post in the store.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the query fails.
    pub async fn get_all_posts(&self) -> ApiResult<Vec<Post>> {
        Ok(db::get_all_posts(self.db.pool()).await?)
    }

    /// Apply a partial update to a post.
    ///
    /// The user must exist but is not checked against the post's owner.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user or post.
    pub async fn update_post(&self, user_id: &str, post_id: &str, update: PostUpdate) -> ApiResult<Post> {
        let pool = self.db.pool();

        if db::get_user(pool, user_id).await?.is_none() {
            return Err(ApiError::user_not_found());
        }

        // Nothing to change; leave updatedAt alone.
        if update.is_empty() {
            return db::get_post(pool, post_id)
                .await?
                .ok_or_else(ApiError::post_not_found);
        }

        let post = db::update_post(pool, post_id, &update)
            .await?
            .ok_or_else(ApiError::post_not_found)?;

        debug!(post_id = %post_id, "Updated post");
        Ok(post)
    }

    /// Remove a post from the owner's reference list, the posts collection
    /// and the media host, in that order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user, an unknown post, or an image the media
    /// host no longer has. Steps that ran before the failing one stay applied.
    pub async fn delete_post(&self, user_id: &str, post_id: &str, post_img_url: &str) -> ApiResult<()> {
        let pool = self.db.pool();

        let user = db::get_user(pool, user_id)
            .await?
            .ok_or_else(ApiError::user_not_found)?;

        let remaining: Vec<String> = user
            .posts
            .into_iter()
            .filter(|url| url != post_img_url)
            .collect();
        if !db::set_user_posts(pool, user_id, &remaining).await? {
            return Err(ApiError::user_not_found());
        }
        debug!(user_id = %user_id, remaining = remaining.len(), "Removed post reference from user");

        if !db::delete_post(pool, post_id).await? {
            return Err(ApiError::post_not_found());
        }
        debug!(post_id = %post_id, "Deleted post document");

        let public_id = self
            .media
            .public_id_from_url(post_img_url)
            .ok_or_else(ApiError::post_not_found)?;
        let destroyed = self
            .media
            .destroy(&public_id)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Image deletion failed: {e}")))?;
        if !destroyed {
            return Err(ApiError::post_not_found());
        }

        info!(user_id = %user_id, post_id = %post_id, public_id = %public_id, "Deleted post");
        Ok(())
    }

    /// Like the post if `acting_user_id` has not liked it yet, unlike it
    /// otherwise. Returns whether the post is liked afterwards.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown profile user, an index past the end of the
    /// user's post list, or a post that no longer exists.
    pub async fn toggle_like(
        &self,
        profile_user_id: &str,
        target: PostRef,
        acting_user_id: &str,
    ) -> ApiResult<bool> {
        let pool = self.db.pool();

        let profile_user = db::get_user(pool, profile_user_id)
            .await?
            .ok_or_else(ApiError::user_not_found)?;

        let post_id = match target {
            PostRef::Id(id) => id,
            PostRef::Index(index) => {
                let post_img_url = profile_user
                    .posts
                    .get(index)
                    .ok_or_else(ApiError::post_not_found)?;
                db::get_post_by_image(pool, post_img_url)
                    .await?
                    .ok_or_else(ApiError::post_not_found)?
                    .id
            }
        };

        let is_liked = db::toggle_post_like(pool, &post_id, acting_user_id)
            .await?
            .ok_or_else(ApiError::post_not_found)?;

        debug!(post_id = %post_id, user_id = %acting_user_id, is_liked, "Toggled like");
        Ok(is_liked)
    }
}
