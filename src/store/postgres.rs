use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::{BlogStore, CommentStore, UserStore};
use crate::http_error::AppError;
use crate::plugins::auth::models::{NewUser, User};
use crate::plugins::blog::models::{Blog, BlogPatch, BlogStatus, ContentBlock, NewBlog};
use crate::plugins::comments::models::{Comment, NewComment};

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, created_at";
const BLOG_COLUMNS: &str = "id, user_id, title, title_image, content, tags, status, created_at, views, viewed_by, likes";
const COMMENT_COLUMNS: &str = "id, blog_id, user_id, text, created_at, is_read, parent_comment";

#[derive(Debug, sqlx::FromRow)]
struct BlogRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    title_image: Option<String>,
    content: Json<Vec<ContentBlock>>,
    tags: Vec<String>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    views: i64,
    viewed_by: Vec<Uuid>,
    likes: Vec<Uuid>,
}

impl TryFrom<BlogRow> for Blog {
    type Error = AppError;

    fn try_from(r: BlogRow) -> Result<Self, Self::Error> {
        let status = BlogStatus::parse(&r.status)
            .ok_or_else(|| AppError::internal(format!("unexpected blog status {:?}", r.status)))?;
        Ok(Blog {
            id: r.id,
            user: r.user_id,
            title: r.title,
            title_image: r.title_image,
            content: r.content.0,
            tags: r.tags,
            status,
            created_at: r.created_at,
            views: r.views,
            viewed_by: r.viewed_by,
            likes: r.likes,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    blog_id: Uuid,
    user_id: Uuid,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
    is_read: bool,
    parent_comment: Option<Uuid>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Comment {
            id: r.id,
            blog: r.blog_id,
            user: r.user_id,
            text: r.text,
            created_at: r.created_at,
            is_read: r.is_read,
            parent_comment: r.parent_comment,
        }
    }
}

fn blogs_from_rows(rows: Vec<BlogRow>) -> Result<Vec<Blog>, AppError> {
    rows.into_iter().map(Blog::try_from).collect()
}

fn blog_from_row(row: Option<BlogRow>) -> Result<Option<Blog>, AppError> {
    row.map(Blog::try_from).transpose()
}

/// Postgres-backed store. Concurrency-sensitive writes are single
/// conditional `UPDATE ... RETURNING` statements.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, phone) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.phone)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row)
    }

    async fn update_user(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($1, name), phone = COALESCE($2, phone) WHERE id = $3 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(phone)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row)
    }

    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(|r| (r.get("id"), r.get("name"))).collect())
    }
}

#[async_trait]
impl BlogStore for PgStore {
    async fn insert_blog(&self, blog: NewBlog) -> Result<Blog, AppError> {
        let sql = format!(
            "INSERT INTO blogs (id, user_id, title, title_image, content, tags, status) VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(blog.user)
            .bind(&blog.title)
            .bind(&blog.title_image)
            .bind(Json(&blog.content))
            .bind(&blog.tags)
            .bind(blog.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Blog::try_from(row)
    }

    async fn get_blog(&self, id: Uuid) -> Result<Option<Blog>, AppError> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1");
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        blog_from_row(row)
    }

    async fn list_public_blogs(&self) -> Result<Vec<Blog>, AppError> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE status = 'public' ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, BlogRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        blogs_from_rows(rows)
    }

    async fn list_blogs_by_user(&self, user: Uuid) -> Result<Vec<Blog>, AppError> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE user_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(user)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        blogs_from_rows(rows)
    }

    async fn update_blog(&self, id: Uuid, owner: Uuid, patch: BlogPatch) -> Result<Option<Blog>, AppError> {
        let (set_title_image, title_image) = match patch.title_image {
            Some(value) => (true, value),
            None => (false, None),
        };
        let sql = format!(
            "UPDATE blogs SET title = COALESCE($1, title), \
             title_image = CASE WHEN $2 THEN $3 ELSE title_image END, \
             content = COALESCE($4, content), tags = COALESCE($5, tags), status = COALESCE($6, status) \
             WHERE id = $7 AND user_id = $8 RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(patch.title)
            .bind(set_title_image)
            .bind(title_image)
            .bind(patch.content.map(Json))
            .bind(patch.tags)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        blog_from_row(row)
    }

    async fn delete_blog(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError> {
        // comments go with the blog through ON DELETE CASCADE
        let sql = format!("DELETE FROM blogs WHERE id = $1 AND user_id = $2 RETURNING {BLOG_COLUMNS}");
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        blog_from_row(row)
    }

    async fn record_view(&self, id: Uuid, viewer: Uuid) -> Result<Option<i64>, AppError> {
        let counted: Option<i64> = sqlx::query_scalar(
            "UPDATE blogs SET views = views + 1, viewed_by = array_append(viewed_by, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(viewed_by)) RETURNING views",
        )
        .bind(id)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        if counted.is_some() {
            return Ok(counted);
        }
        // already counted for this viewer, or no such blog
        let current: Option<i64> = sqlx::query_scalar("SELECT views FROM blogs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(current)
    }

    async fn toggle_like(&self, id: Uuid, user: Uuid) -> Result<Option<Blog>, AppError> {
        let sql = format!(
            "UPDATE blogs SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2) ELSE array_append(likes, $2) END \
             WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        blog_from_row(row)
    }

    async fn toggle_status(&self, id: Uuid, owner: Uuid) -> Result<Option<Blog>, AppError> {
        let sql = format!(
            "UPDATE blogs SET status = CASE WHEN status = 'public' THEN 'private' ELSE 'public' END \
             WHERE id = $1 AND user_id = $2 RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        blog_from_row(row)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, AppError> {
        let sql = format!(
            "INSERT INTO comments (id, blog_id, user_id, text, parent_comment) VALUES ($1,$2,$3,$4,$5) RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(comment.blog)
            .bind(comment.user)
            .bind(&comment.text)
            .bind(comment.parent_comment)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.into())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, blog: Uuid) -> Result<Vec<Comment>, AppError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE blog_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(blog)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn delete_comment_thread(&self, id: Uuid) -> Result<u64, AppError> {
        let res = sqlx::query(
            "WITH RECURSIVE thread AS ( \
                SELECT id FROM comments WHERE id = $1 \
                UNION ALL \
                SELECT c.id FROM comments c JOIN thread t ON c.parent_comment = t.id \
             ) DELETE FROM comments WHERE id IN (SELECT id FROM thread)",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(res.rows_affected())
    }

    async fn mark_comment_seen(&self, id: Uuid) -> Result<bool, AppError> {
        let res = sqlx::query("UPDATE comments SET is_read = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(res.rows_affected() > 0)
    }

    async fn unseen_comments_for_owner(&self, owner: Uuid, limit: i64) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.blog_id, c.user_id, c.text, c.created_at, c.is_read, c.parent_comment \
             FROM comments c JOIN blogs b ON b.id = c.blog_id \
             WHERE b.user_id = $1 AND c.is_read = false AND c.user_id <> $1 \
             ORDER BY c.created_at DESC LIMIT $2",
        )
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn comment_counts(&self, blogs: &[Uuid]) -> Result<HashMap<Uuid, i64>, AppError> {
        if blogs.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query("SELECT blog_id, COUNT(*) AS n FROM comments WHERE blog_id = ANY($1) GROUP BY blog_id")
            .bind(blogs)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(|r| (r.get("blog_id"), r.get("n"))).collect())
    }
}
