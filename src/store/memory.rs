use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{BlogStore, CommentStore, UserStore};
use crate::http_error::AppError;
use crate::plugins::auth::models::{NewUser, User};
use crate::plugins::blog::models::{Blog, BlogPatch, BlogStatus, NewBlog};
use crate::plugins::comments::models::{Comment, NewComment};

#[derive(Default)]
struct State {
    users: Vec<User>,
    // insertion order doubles as creation order
    blogs: Vec<Blog>,
    comments: Vec<Comment>,
}

impl State {
    fn blog_mut(&mut self, id: Uuid) -> Option<&mut Blog> {
        self.blogs.iter_mut().find(|b| b.id == id)
    }
}

/// Process-local store. Each operation runs under a single lock, which makes
/// the toggle/increment operations atomic the same way the SQL statements are.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.inner.lock();
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("duplicateKey", "duplicate_email"));
        }
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            phone: user.phone,
            created_at: chrono::Utc::now(),
        };
        state.users.push(stored.clone());
        Ok(stored)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_user(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> Result<Option<User>, AppError> {
        let mut state = self.inner.lock();
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(phone) = phone {
            user.phone = Some(phone);
        }
        Ok(Some(user.clone()))
    }

    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, AppError> {
        let state = self.inner.lock();
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.name.clone()))
            .collect())
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn insert_blog(&self, blog: NewBlog) -> Result<Blog, AppError> {
        let mut state = self.inner.lock();
        if !state.users.iter().any(|u| u.id == blog.user) {
            return Err(AppError::not_found("referencedRecordMissing"));
        }
        let stored = Blog {
            id: Uuid::new_v4(),
            user: blog.user,
            title: blog.title,
            title_image: blog.title_image,
            content: blog.content,
            tags: blog.tags,
            status: blog.status,
            created_at: chrono::Utc::now(),
            views: 0,
            viewed_by: Vec::new(),
            likes: Vec::new(),
        };
        state.blogs.push(stored.clone());
        Ok(stored)
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError> {
        Ok(self.inner.lock().blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn list_public_blogs(&self) -> Result<Vec<Blog>, AppError> {
        let state = self.inner.lock();
        Ok(state.blogs.iter().rev().filter(|b| b.status == BlogStatus::Public).cloned().collect())
    }

    async fn list_blogs_by_user(&self, user: Uuid) -> Result<Vec<Blog>, AppError> {
        let state = self.inner.lock();
        Ok(state.blogs.iter().rev().filter(|b| b.user == user).cloned().collect())
    }

    async fn update_blog(&self, id: Uuid, owner: Uuid, patch: BlogPatch) -> Result<Option<Blog>, AppError> {
        let mut state = self.inner.lock();
        match state.blog_mut(id) {
            Some(blog) if blog.user == owner => {
                patch.apply_to(blog);
                Ok(Some(blog.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_blog(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError> {
        let mut state = self.inner.lock();
        let Some(pos) = state.blogs.iter().position(|b| b.id == id && b.user == owner) else {
            return Ok(None);
        };
        let removed = state.blogs.remove(pos);
        state.comments.retain(|c| c.blog != id);
        Ok(Some(removed))
    }

    async fn record_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<i64>, AppError> {
        let mut state = self.inner.lock();
        let Some(blog) = state.blog_mut(id) else {
            return Ok(None);
        };
        if !blog.viewed_by.contains(&viewer) {
            blog.viewed_by.push(viewer);
            blog.views += 1;
        }
        Ok(Some(blog.views))
    }

    async fn toggle_like(&self, id: Uuid, user: Uuid) -> Result<Option<Blog>, AppError> {
        let mut state = self.inner.lock();
        let Some(blog) = state.blog_mut(id) else {
            return Ok(None);
        };
        if let Some(pos) = blog.likes.iter().position(|u| *u == user) {
            blog.likes.remove(pos);
        } else {
            blog.likes.push(user);
        }
        Ok(Some(blog.clone()))
    }

    async fn toggle_status(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError> {
        let mut state = self.inner.lock();
        match state.blog_mut(id) {
            Some(blog) if blog.user == owner => {
                blog.status = blog.status.toggled();
                Ok(Some(blog.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let mut state = self.inner.lock();
        if !state.blogs.iter().any(|b| b.id == comment.blog) {
            return Err(AppError::not_found("referencedRecordMissing"));
        }
        let stored = Comment {
            id: Uuid::new_v4(),
            blog: comment.blog,
            user: comment.user,
            text: comment.text,
            created_at: chrono::Utc::now(),
            is_read: false,
            parent_comment: comment.parent_comment,
        };
        state.comments.push(stored.clone());
        Ok(stored)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        Ok(self.inner.lock().comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, blog: Uuid) -> Result<Vec<Comment>, AppError> {
        let state = self.inner.lock();
        Ok(state.comments.iter().rev().filter(|c| c.blog == blog).cloned().collect())
    }

    async fn delete_comment_thread(&self, id: Uuid) -> Result<u64, AppError> {
        let mut state = self.inner.lock();
        if !state.comments.iter().any(|c| c.id == id) {
            return Ok(0);
        }
        let mut doomed: HashSet<Uuid> = HashSet::from([id]);
        loop {
            let before = doomed.len();
            for c in &state.comments {
                if c.parent_comment.map_or(false, |p| doomed.contains(&p)) {
                    doomed.insert(c.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        state.comments.retain(|c| !doomed.contains(&c.id));
        Ok(doomed.len() as u64)
    }

    async fn mark_comment_seen(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.inner.lock();
        match state.comments.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unseen_comments_for_owner(&self, owner: Uuid, limit: i64) -> Result<Vec<Comment>, AppError> {
        let state = self.inner.lock();
        let owned: HashSet<Uuid> = state.blogs.iter().filter(|b| b.user == owner).map(|b| b.id).collect();
        Ok(state
            .comments
            .iter()
            .rev()
            .filter(|c| !c.is_read && c.user != owner && owned.contains(&c.blog))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn comment_counts(&self, blogs: &[Uuid]) -> Result<HashMap<Uuid, i64>, AppError> {
        let state = self.inner.lock();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for c in state.comments.iter().filter(|c| blogs.contains(&c.blog)) {
            *counts.entry(c.blog).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::blog::models::ContentBlock;

    async fn seed_user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser { name: email.into(), email: email.into(), password_hash: "x".into(), phone: None })
            .await
            .unwrap()
    }

    async fn seed_blog(store: &MemoryStore, owner: Uuid) -> Blog {
        store
            .insert_blog(NewBlog {
                user: owner,
                title: "Hello".into(),
                title_image: None,
                content: vec![ContentBlock::Text("world".into())],
                tags: vec!["General".into()],
                status: BlogStatus::Public,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        seed_user(&store, "a@example.com").await;
        let err = store
            .insert_user(NewUser { name: "b".into(), email: "a@example.com".into(), password_hash: "y".into(), phone: None })
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("duplicate_email"));
    }

    #[tokio::test]
    async fn concurrent_likes_do_not_lose_updates() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let owner = seed_user(&store, "o@example.com").await;
        let blog_id = seed_blog(&store, owner.id).await.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.toggle_like(blog_id, Uuid::new_v4()).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let likes = store.get_blog(blog_id).await.unwrap().unwrap().likes;
        assert_eq!(likes.len(), 16);
    }

    #[tokio::test]
    async fn thread_delete_removes_nested_replies_only() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "o@example.com").await;
        let blog = seed_blog(&store, owner.id).await;
        let new = |parent| NewComment { blog: blog.id, user: owner.id, text: "c".into(), parent_comment: parent };

        let root = store.insert_comment(new(None)).await.unwrap();
        let reply = store.insert_comment(new(Some(root.id))).await.unwrap();
        let nested = store.insert_comment(new(Some(reply.id))).await.unwrap();
        let sibling = store.insert_comment(new(None)).await.unwrap();

        assert_eq!(store.delete_comment_thread(root.id).await.unwrap(), 3);
        assert!(store.get_comment(nested.id).await.unwrap().is_none());
        assert!(store.get_comment(sibling.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn status_toggle_requires_owner() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "o@example.com").await;
        let blog = seed_blog(&store, owner.id).await;
        assert!(store.toggle_status(blog.id, Uuid::new_v4()).await.unwrap().is_none());
        let flipped = store.toggle_status(blog.id, owner.id).await.unwrap().unwrap();
        assert_eq!(flipped.status, BlogStatus::Private);
    }
}
