//! Blog operations on top of the store and media seams. Handlers stay thin;
//! ownership, visibility and upload bookkeeping live here.

use std::collections::HashSet;
use uuid::Uuid;

use crate::http_error::{AppError, FieldError};
use crate::media::{delete_best_effort, placeholder_field, resolve_uploads, DynMedia};
use crate::plugins::blog::content::{check_content, check_placeholders, clean_title, normalize_tags};
use crate::plugins::blog::models::{
    AuthorView, Blog, BlogPatch, ContentBlock, DeletedBlog, NewBlog, OwnBlog, PublicBlog, ViewCount,
};
use crate::plugins::blog::submission::BlogSubmission;
use crate::store::DynStore;

const UNKNOWN_AUTHOR: &str = "Unknown";

fn blog_not_found() -> AppError {
    AppError::not_found("Blog not found")
}

fn not_owner() -> AppError {
    AppError::forbidden("Not allowed")
}

fn clean_title_image(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn upload_targets<'a>(content: &'a mut [ContentBlock], title_image: Option<&'a mut String>) -> Vec<&'a mut String> {
    let mut targets: Vec<&mut String> = content
        .iter_mut()
        .filter_map(|b| match b {
            ContentBlock::Image(url) => Some(url),
            _ => None,
        })
        .collect();
    targets.extend(title_image);
    targets
}

/// A stored image may only be referenced by the blog it was uploaded for.
/// `known` holds the URLs the blog already references; any other managed URL
/// must arrive as a fresh upload placeholder.
fn check_media_refs(
    media: &DynMedia,
    content: &[ContentBlock],
    title_image: Option<&str>,
    known: &HashSet<String>,
) -> Vec<FieldError> {
    let foreign = |url: &str| placeholder_field(url).is_none() && media.manages(url) && !known.contains(url);
    let mut errors: Vec<FieldError> = content
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b, ContentBlock::Image(url) if foreign(url.as_str())))
        .map(|(i, _)| FieldError::new(format!("content[{i}]"), "image was not uploaded for this blog"))
        .collect();
    if title_image.map_or(false, foreign) {
        errors.push(FieldError::new("titleImage", "image was not uploaded for this blog"));
    }
    errors
}

/// Loads a blog and checks that `user` owns it. Missing blogs are NotFound,
/// foreign ones Forbidden.
async fn owned_blog(store: &DynStore, id: Uuid, user: Uuid) -> Result<Blog, AppError> {
    let blog = store.get_blog(id).await?.ok_or_else(blog_not_found)?;
    if !blog.is_owned_by(user) {
        tracing::info!(blog_id = %id, user_id = %user, "rejected write by non-owner");
        return Err(not_owner());
    }
    Ok(blog)
}

async fn visible_blog(store: &DynStore, id: Uuid, requester: Option<Uuid>) -> Result<Blog, AppError> {
    let blog = store.get_blog(id).await?.ok_or_else(blog_not_found)?;
    if !blog.is_visible_to(requester) {
        return Err(AppError::forbidden("This blog is private"));
    }
    Ok(blog)
}

pub async fn create_blog(
    store: &DynStore,
    media: &DynMedia,
    author: Uuid,
    submission: BlogSubmission,
) -> Result<Blog, AppError> {
    let BlogSubmission { payload, files } = submission;
    let mut errors: Vec<FieldError> = Vec::new();

    let title = match clean_title(payload.title.as_deref().unwrap_or_default()) {
        Ok(title) => title,
        Err(e) => {
            errors.push(e);
            String::new()
        }
    };
    let mut content = payload.content.unwrap_or_default();
    let mut title_image = clean_title_image(payload.title_image);
    errors.extend(check_content(&content));
    errors.extend(check_placeholders(&content));
    errors.extend(check_media_refs(media, &content, title_image.as_deref(), &HashSet::new()));
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let batch = resolve_uploads(media, upload_targets(&mut content, title_image.as_mut()), files).await?;

    let blog = store
        .insert_blog(NewBlog {
            user: author,
            title,
            title_image,
            content,
            tags: normalize_tags(payload.tag.unwrap_or_default()),
            status: payload.status.unwrap_or_default(),
        })
        .await?;
    batch.commit();
    tracing::info!(blog_id = %blog.id, user_id = %author, "created blog");
    Ok(blog)
}

pub async fn get_blog(store: &DynStore, id: Uuid, requester: Option<Uuid>) -> Result<Blog, AppError> {
    visible_blog(store, id, requester).await
}

pub async fn list_public(store: &DynStore) -> Result<Vec<PublicBlog>, AppError> {
    let blogs = store.list_public_blogs().await?;
    let authors: Vec<Uuid> = blogs.iter().map(|b| b.user).collect::<HashSet<_>>().into_iter().collect();
    let names = store.user_names(&authors).await?;
    Ok(blogs
        .into_iter()
        .map(|blog| {
            let name = names.get(&blog.user).map(String::as_str).unwrap_or(UNKNOWN_AUTHOR);
            PublicBlog { author: AuthorView::for_name(name), blog }
        })
        .collect())
}

pub async fn list_mine(store: &DynStore, owner: Uuid) -> Result<Vec<OwnBlog>, AppError> {
    let blogs = store.list_blogs_by_user(owner).await?;
    let ids: Vec<Uuid> = blogs.iter().map(|b| b.id).collect();
    let counts = store.comment_counts(&ids).await?;
    Ok(blogs
        .into_iter()
        .map(|blog| OwnBlog { comment_count: counts.get(&blog.id).copied().unwrap_or(0), blog })
        .collect())
}

/// Merges the submitted fields into an owned blog. Images the blog no longer
/// references afterwards are removed from the media store.
pub async fn update_blog(
    store: &DynStore,
    media: &DynMedia,
    id: Uuid,
    owner: Uuid,
    submission: BlogSubmission,
) -> Result<Blog, AppError> {
    let existing = owned_blog(store, id, owner).await?;
    let BlogSubmission { payload, files } = submission;

    let mut errors: Vec<FieldError> = Vec::new();
    let mut patch = BlogPatch::default();
    if let Some(title) = payload.title {
        match clean_title(&title) {
            Ok(title) => patch.title = Some(title),
            Err(e) => errors.push(e),
        }
    }
    if let Some(content) = payload.content {
        errors.extend(check_content(&content));
        errors.extend(check_placeholders(&content));
        patch.content = Some(content);
    }
    // an empty titleImage clears it
    patch.title_image = payload.title_image.map(|raw| clean_title_image(Some(raw)));
    let known: HashSet<String> = existing.image_urls().into_iter().collect();
    errors.extend(check_media_refs(
        media,
        patch.content.as_deref().unwrap_or_default(),
        patch.title_image.as_ref().and_then(Option::as_deref),
        &known,
    ));
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }
    patch.tags = payload.tag.map(normalize_tags);
    patch.status = payload.status;

    let batch = {
        let mut no_content: Vec<ContentBlock> = Vec::new();
        let content = patch.content.as_mut().unwrap_or(&mut no_content);
        let title_image = patch.title_image.as_mut().and_then(Option::as_mut);
        resolve_uploads(media, upload_targets(content, title_image), files).await?
    };

    let updated = store.update_blog(id, owner, patch).await?.ok_or_else(blog_not_found)?;
    batch.commit();

    let kept: HashSet<String> = updated.image_urls().into_iter().collect();
    let stale: Vec<String> = existing.image_urls().into_iter().filter(|url| !kept.contains(url)).collect();
    if !stale.is_empty() {
        tracing::debug!(blog_id = %id, count = stale.len(), "removing replaced images");
        delete_best_effort(media, stale).await;
    }
    Ok(updated)
}

pub async fn delete_blog(store: &DynStore, media: &DynMedia, id: Uuid, owner: Uuid) -> Result<DeletedBlog, AppError> {
    owned_blog(store, id, owner).await?;
    let deleted = store.delete_blog(id, owner).await?.ok_or_else(blog_not_found)?;
    delete_best_effort(media, deleted.image_urls()).await;
    tracing::info!(blog_id = %id, user_id = %owner, "deleted blog");
    Ok(DeletedBlog { success: true, deleted_blog: deleted })
}

pub async fn record_view(store: &DynStore, id: Uuid, viewer: Uuid) -> Result<ViewCount, AppError> {
    visible_blog(store, id, Some(viewer)).await?;
    let views = store.record_view(id, viewer).await?.ok_or_else(blog_not_found)?;
    Ok(ViewCount { views })
}

pub async fn toggle_like(store: &DynStore, id: Uuid, user: Uuid) -> Result<Blog, AppError> {
    visible_blog(store, id, Some(user)).await?;
    store.toggle_like(id, user).await?.ok_or_else(blog_not_found)
}

pub async fn toggle_status(store: &DynStore, id: Uuid, owner: Uuid) -> Result<Blog, AppError> {
    owned_blog(store, id, owner).await?;
    store.toggle_status(id, owner).await?.ok_or_else(blog_not_found)
}
