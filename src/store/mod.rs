//! Persistence seam. Handlers talk to `Arc<dyn Store>`; the process picks
//! `PgStore` or `MemoryStore` at startup.
//!
//! Every mutating operation that has to be safe under concurrent requests
//! (view increments, like toggles, status flips, cascade deletes) is a single
//! store call so each backend can apply it atomically.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::http_error::AppError;
use crate::plugins::auth::models::{NewUser, User};
use crate::plugins::blog::models::{Blog, BlogPatch, NewBlog};
use crate::plugins::comments::models::{Comment, NewComment};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with a conflict when the email is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn update_user(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> Result<Option<User>, AppError>;
    /// Resolves display names for the given ids; unknown ids are absent from the map.
    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, AppError>;
}

#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn insert_blog(&self, blog: NewBlog) -> Result<Blog, AppError>;
    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError>;
    /// Public blogs, newest first.
    async fn list_public_blogs(&self) -> Result<Vec<Blog>, AppError>;
    /// All blogs owned by `user`, newest first.
    async fn list_blogs_by_user(&self, user: Uuid) -> Result<Vec<Blog>, AppError>;
    /// Applies `patch` to the blog `id` if it is owned by `owner`.
    async fn update_blog(&self, id: Uuid, owner: Uuid, patch: BlogPatch) -> Result<Option<Blog>, AppError>;
    /// Removes an owned blog together with its comments.
    async fn delete_blog(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError>;
    /// Counts `viewer` once; returns the view count, `None` if the blog is gone.
    async fn record_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<i64>, AppError>;
    async fn toggle_like(&self, id: Uuid, user: Uuid) -> Result<Option<Blog>, AppError>;
    async fn toggle_status(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, AppError>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError>;
    /// Comments of one blog, newest first.
    async fn list_comments(&self, blog: Uuid) -> Result<Vec<Comment>, AppError>;
    /// Deletes the comment and every reply below it. Returns the number removed.
    async fn delete_comment_thread(&self, id: Uuid) -> Result<u64, AppError>;
    async fn mark_comment_seen(&self, id: Uuid) -> Result<bool, AppError>;
    /// Unread comments left by other users on blogs owned by `owner`, newest first.
    async fn unseen_comments_for_owner(&self, owner: Uuid, limit: i64) -> Result<Vec<Comment>, AppError>;
    async fn comment_counts(&self, blogs: &[Uuid]) -> Result<HashMap<Uuid, i64>, AppError>;
}

pub trait Store: UserStore + BlogStore + CommentStore + 'static {}

impl<T> Store for T where T: UserStore + BlogStore + CommentStore + 'static {}

pub type DynStore = Arc<dyn Store>;
