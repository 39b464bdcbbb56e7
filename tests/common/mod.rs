//! Shared fixtures for integration tests.
//!
//! Provides a temporary database and an in-memory media store so the post
//! flows can run without a real media host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use social_posts::db::{insert_user, Database, NewUser};
use social_posts::media::cloudinary::extract_public_id;
use social_posts::media::{ImagePayload, MediaError, MediaStore, UploadedImage};
use tempfile::TempDir;

/// A 1x1 transparent PNG as a data URL.
pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub const MEDIA_BASE_URL: &str = "https://media.test/demo/image/upload";

pub async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

pub async fn seed_user(db: &Database, name: &str) -> String {
    insert_user(
        db.pool(),
        &NewUser {
            user_name: name.to_string(),
            user_avatar_url: format!("https://avatars.test/{name}.png"),
        },
    )
    .await
    .expect("Failed to insert user")
}

/// Media store that keeps uploads in memory and hands out
/// Cloudinary-shaped URLs.
#[derive(Clone, Default)]
pub struct FakeMediaStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    upload_calls: Arc<Mutex<usize>>,
}

impl FakeMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(public_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn upload_calls(&self) -> usize {
        *self.upload_calls.lock().unwrap()
    }

    /// Drop an object behind the service's back.
    pub fn forget(&self, public_id: &str) {
        self.objects.lock().unwrap().remove(public_id);
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn upload(&self, key: &str, image: &ImagePayload) -> Result<UploadedImage, MediaError> {
        *self.upload_calls.lock().unwrap() += 1;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), image.bytes.clone());
        Ok(UploadedImage {
            url: format!("{MEDIA_BASE_URL}/v1/{key}.{}", image.format),
            public_id: key.to_string(),
        })
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        extract_public_id(url)
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, MediaError> {
        Ok(self.objects.lock().unwrap().remove(public_id).is_some())
    }
}
