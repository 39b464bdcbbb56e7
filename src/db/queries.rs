use anyhow::{Context, Result};
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::models::{new_object_id, NewPost, NewUser, Post, PostUpdate, User};

// ========== Users ==========

/// Insert a new user with an empty post list, returning its ID.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<String> {
    let id = new_object_id();

    sqlx::query(
        r"
        INSERT INTO users (id, user_name, user_avatar_url, posts)
        VALUES (?, ?, ?, '[]')
        ",
    )
    .bind(&id)
    .bind(&user.user_name)
    .bind(&user.user_avatar_url)
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(id)
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user")
}

/// Find users whose name contains `text`, ignoring ASCII case.
pub async fn search_users(pool: &SqlitePool, text: &str, limit: i64) -> Result<Vec<User>> {
    let pattern = format!("%{}%", escape_like(text));

    sqlx::query_as(
        r"
        SELECT * FROM users
        WHERE user_name LIKE ? ESCAPE '\'
        ORDER BY user_name COLLATE NOCASE, rowid
        LIMIT ?
        ",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search users")
}

/// Replace a user's post-reference list. Returns false if the user is gone.
pub async fn set_user_posts(pool: &SqlitePool, user_id: &str, posts: &[String]) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET posts = ? WHERE id = ?")
        .bind(Json(posts))
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update user post list")?;

    Ok(result.rows_affected() > 0)
}

/// Append an image URL to the end of a user's post-reference list.
pub async fn append_user_post(pool: &SqlitePool, user_id: &str, post_img_url: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET posts = json_insert(posts, '$[#]', ?) WHERE id = ?")
        .bind(post_img_url)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to append to user post list")?;

    Ok(result.rows_affected() > 0)
}

// ========== Posts ==========

/// Insert a new post with no likes or comments, returning its ID.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<String> {
    let id = new_object_id();

    sqlx::query(
        r"
        INSERT INTO posts (id, user_id, user_name, user_avatar_url, title, description,
                           post_img_url, likes, comments, is_private)
        VALUES (?, ?, ?, ?, ?, ?, ?, '[]', '[]', ?)
        ",
    )
    .bind(&id)
    .bind(&post.user_id)
    .bind(&post.user_name)
    .bind(&post.user_avatar_url)
    .bind(&post.title)
    .bind(&post.description)
    .bind(&post.post_img_url)
    .bind(post.is_private)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok(id)
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: &str) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get the post a given owner created with a given image.
pub async fn get_post_by_owner_and_image(
    pool: &SqlitePool,
    user_id: &str,
    post_img_url: &str,
) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE user_id = ? AND post_img_url = ? LIMIT 1")
        .bind(user_id)
        .bind(post_img_url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by owner and image")
}

/// Get the first post carrying an image URL.
pub async fn get_post_by_image(pool: &SqlitePool, post_img_url: &str) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE post_img_url = ? ORDER BY rowid LIMIT 1")
        .bind(post_img_url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by image")
}

/// Get every post owned by a user, oldest first. Visibility is not applied.
pub async fn get_posts_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE user_id = ? ORDER BY created_at, rowid")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts for user")
}

/// Get every post in the store, oldest first.
pub async fn get_all_posts(pool: &SqlitePool) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts ORDER BY created_at, rowid")
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts")
}

/// Apply a partial update and return the post as stored afterwards.
///
/// Returns `None` if no post has this ID.
pub async fn update_post(pool: &SqlitePool, id: &str, update: &PostUpdate) -> Result<Option<Post>> {
    sqlx::query_as(
        r"
        UPDATE posts
        SET title = COALESCE(?, title),
            description = COALESCE(?, description),
            is_private = COALESCE(?, is_private),
            updated_at = datetime('now')
        WHERE id = ?
        RETURNING *
        ",
    )
    .bind(&update.title)
    .bind(&update.description)
    .bind(update.is_private)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to update post")
}

/// Delete a post by ID. Returns false if it did not exist.
pub async fn delete_post(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(result.rows_affected() > 0)
}

/// Flip `user_id`'s membership in a post's liker set.
///
/// Returns the membership after the flip, or `None` if the post does not
/// exist. The read and the write share one transaction that takes the write
/// lock up front, so concurrent toggles are applied one after the other.
pub async fn toggle_post_like(pool: &SqlitePool, post_id: &str, user_id: &str) -> Result<Option<bool>> {
    let mut tx = pool.begin().await.context("Failed to begin like transaction")?;

    // A no-op write first, so the transaction holds the write lock before reading.
    let touched = sqlx::query("UPDATE posts SET likes = likes WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to lock post for like")?;
    if touched.rows_affected() == 0 {
        return Ok(None);
    }

    let (Json(mut likes),): (Json<Vec<String>>,) =
        sqlx::query_as("SELECT likes FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read post likes")?;

    let liked = if let Some(pos) = likes.iter().position(|id| id == user_id) {
        likes.remove(pos);
        false
    } else {
        likes.push(user_id.to_string());
        true
    };

    sqlx::query("UPDATE posts SET likes = ? WHERE id = ?")
        .bind(Json(&likes))
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to write post likes")?;

    tx.commit().await.context("Failed to commit like toggle")?;

    Ok(Some(liked))
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
