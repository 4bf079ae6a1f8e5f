use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub blog: Uuid,
    pub user: Uuid,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub is_read: bool,
    pub parent_comment: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog: Uuid,
    pub user: Uuid,
    pub text: String,
    pub parent_comment: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentAuthor {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: CommentAuthor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: CommentAuthor,
    pub blog_title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateComment {
    pub text: String,
    #[serde(alias = "parentComment")]
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}
