//! Social posts service library.
//!
//! A REST backend for a social feed: users publish image posts, browse each
//! other's profiles and like posts. Post documents live in SQLite and images
//! are stored on a hosted media service.

pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod posts;
pub mod web;
