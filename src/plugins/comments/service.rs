use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::http_error::{AppError, FieldError};
use crate::plugins::blog::models::Blog;
use crate::plugins::comments::models::{
    Comment, CommentAuthor, CommentView, CreateComment, NewComment, UnseenComment,
};
use crate::store::DynStore;

pub const DEFAULT_RECENT_LIMIT: u32 = 20;
pub const MAX_RECENT_LIMIT: u32 = 100;
const UNKNOWN_AUTHOR: &str = "Unknown";

fn comment_not_found() -> AppError {
    AppError::not_found("Comment not found")
}

async fn author_names(store: &DynStore, comments: &[Comment]) -> Result<HashMap<Uuid, String>, AppError> {
    let ids: Vec<Uuid> = comments.iter().map(|c| c.user).collect::<HashSet<_>>().into_iter().collect();
    store.user_names(&ids).await
}

fn author(names: &HashMap<Uuid, String>, user: Uuid) -> CommentAuthor {
    CommentAuthor { name: names.get(&user).cloned().unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()) }
}

/// Loads a comment together with its blog and checks that `user` owns the blog.
async fn moderated(store: &DynStore, id: Uuid, user: Uuid) -> Result<(Comment, Blog), AppError> {
    let comment = store.get_comment(id).await?.ok_or_else(comment_not_found)?;
    let blog = store
        .get_blog(comment.blog)
        .await?
        .ok_or_else(|| AppError::not_found("Blog not found"))?;
    if !blog.is_owned_by(user) {
        return Err(AppError::forbidden("Only the blog owner can moderate its comments"));
    }
    Ok((comment, blog))
}

pub async fn list(store: &DynStore, blog_id: Uuid, requester: Option<Uuid>) -> Result<Vec<CommentView>, AppError> {
    let blog = store.get_blog(blog_id).await?.ok_or_else(|| AppError::not_found("Blog not found"))?;
    if !blog.is_visible_to(requester) {
        return Err(AppError::forbidden("This blog is private"));
    }
    let comments = store.list_comments(blog_id).await?;
    let names = author_names(store, &comments).await?;
    Ok(comments
        .into_iter()
        .map(|comment| CommentView { author: author(&names, comment.user), comment })
        .collect())
}

pub async fn create(
    store: &DynStore,
    blog_id: Uuid,
    user: Uuid,
    payload: CreateComment,
) -> Result<CommentView, AppError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::validation(vec![FieldError::new("text", "Comment text is required")]));
    }

    // a private blog is indistinguishable from a missing one for other users
    let blog = store
        .get_blog(blog_id)
        .await?
        .filter(|b| b.is_visible_to(Some(user)))
        .ok_or_else(|| AppError::not_found("Blog not found"))?;

    if let Some(parent_id) = payload.parent_comment_id {
        let parent = store.get_comment(parent_id).await?;
        if parent.map_or(true, |p| p.blog != blog.id) {
            return Err(AppError::validation(vec![FieldError::new(
                "parentComment",
                "Parent comment does not belong to this blog",
            )]));
        }
    }

    let comment = store
        .insert_comment(NewComment {
            blog: blog.id,
            user,
            text: text.to_string(),
            parent_comment: payload.parent_comment_id,
        })
        .await?;
    let names = store.user_names(&[user]).await?;
    tracing::debug!(comment_id = %comment.id, blog_id = %blog.id, "comment added");
    Ok(CommentView { author: author(&names, user), comment })
}

/// Removes the comment and its replies. Returns how many comments went away.
pub async fn delete(store: &DynStore, id: Uuid, user: Uuid) -> Result<u64, AppError> {
    moderated(store, id, user).await?;
    let removed = store.delete_comment_thread(id).await?;
    if removed == 0 {
        return Err(comment_not_found());
    }
    tracing::info!(comment_id = %id, removed, "deleted comment thread");
    Ok(removed)
}

pub async fn mark_seen(store: &DynStore, id: Uuid, user: Uuid) -> Result<(), AppError> {
    moderated(store, id, user).await?;
    if !store.mark_comment_seen(id).await? {
        return Err(comment_not_found());
    }
    Ok(())
}

pub fn clamp_limit(limit: Option<u32>) -> i64 {
    i64::from(limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT))
}

pub async fn recent_unseen(store: &DynStore, owner: Uuid, limit: Option<u32>) -> Result<Vec<UnseenComment>, AppError> {
    let comments = store.unseen_comments_for_owner(owner, clamp_limit(limit)).await?;
    if comments.is_empty() {
        return Ok(Vec::new());
    }
    let titles: HashMap<Uuid, String> = store
        .list_blogs_by_user(owner)
        .await?
        .into_iter()
        .map(|b| (b.id, b.title))
        .collect();
    let names = author_names(store, &comments).await?;
    Ok(comments
        .into_iter()
        .map(|comment| UnseenComment {
            author: author(&names, comment.user),
            blog_title: titles.get(&comment.blog).cloned().unwrap_or_default(),
            comment,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::auth::models::NewUser;
    use crate::plugins::blog::models::{BlogStatus, ContentBlock, NewBlog};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn user(store: &DynStore, name: &str) -> Uuid {
        store
            .insert_user(NewUser {
                name: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                phone: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn blog(store: &DynStore, owner: Uuid, status: BlogStatus) -> Uuid {
        store
            .insert_blog(NewBlog {
                user: owner,
                title: "Hello".into(),
                title_image: None,
                content: vec![ContentBlock::Text("hi".into())],
                tags: vec!["General".into()],
                status,
            })
            .await
            .unwrap()
            .id
    }

    fn body(text: &str, parent: Option<Uuid>) -> CreateComment {
        CreateComment { text: text.into(), parent_comment_id: parent }
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), 100);
    }

    #[tokio::test]
    async fn parent_must_belong_to_same_blog() {
        let store: DynStore = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice").await;
        let first = blog(&store, alice, BlogStatus::Public).await;
        let second = blog(&store, alice, BlogStatus::Public).await;

        let parent = create(&store, first, alice, body("top", None)).await.unwrap();
        let err = create(&store, second, alice, body("reply", Some(parent.comment.id))).await.unwrap_err();
        assert_eq!(err.errors[0].field, "parentComment");

        let reply = create(&store, first, alice, body("reply", Some(parent.comment.id))).await.unwrap();
        assert_eq!(reply.comment.parent_comment, Some(parent.comment.id));
        assert_eq!(reply.author.name, "alice");
    }

    #[tokio::test]
    async fn only_blog_owner_moderates() {
        let store: DynStore = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let post = blog(&store, alice, BlogStatus::Public).await;
        let comment = create(&store, post, bob, body("nice", None)).await.unwrap();

        assert_eq!(mark_seen(&store, comment.comment.id, bob).await.unwrap_err().code.as_deref(), Some("not_owner"));
        assert_eq!(recent_unseen(&store, alice, None).await.unwrap().len(), 1);

        mark_seen(&store, comment.comment.id, alice).await.unwrap();
        assert!(recent_unseen(&store, alice, None).await.unwrap().is_empty());

        assert!(delete(&store, comment.comment.id, bob).await.is_err());
        assert_eq!(delete(&store, comment.comment.id, alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn private_blog_hides_comments_from_others() {
        let store: DynStore = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let post = blog(&store, alice, BlogStatus::Private).await;

        assert_eq!(create(&store, post, bob, body("hi", None)).await.unwrap_err().status.as_u16(), 404);
        assert!(list(&store, post, None).await.is_err());
        create(&store, post, alice, body("note to self", None)).await.unwrap();
        assert_eq!(list(&store, post, Some(alice)).await.unwrap().len(), 1);
        // own comments never show up as unseen
        assert!(recent_unseen(&store, alice, None).await.unwrap().is_empty());
    }
}
