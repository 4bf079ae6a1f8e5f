use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Public,
    Private,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Public => "public",
            BlogStatus::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Some(BlogStatus::Public),
            "private" => Some(BlogStatus::Private),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            BlogStatus::Public => BlogStatus::Private,
            BlogStatus::Private => BlogStatus::Public,
        }
    }
}

// Same rule as form fields: case and surrounding whitespace are ignored.
impl<'de> Deserialize<'de> for BlogStatus {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(de)?;
        BlogStatus::parse(&raw).ok_or_else(|| serde::de::Error::custom("status must be public or private"))
    }
}

/// One ordered unit of a blog body: `{"type": "text", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(String),
    Subtitle(String),
    Image(String),
}

impl ContentBlock {
    pub fn value(&self) -> &str {
        match self {
            ContentBlock::Text(v) | ContentBlock::Subtitle(v) | ContentBlock::Image(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text(_) => "text",
            ContentBlock::Subtitle(_) => "subtitle",
            ContentBlock::Image(_) => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub user: Uuid,
    pub title: String,
    pub title_image: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(rename = "tag")]
    pub tags: Vec<String>,
    pub status: BlogStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub views: i64,
    pub viewed_by: Vec<Uuid>,
    pub likes: Vec<Uuid>,
}

impl Blog {
    pub fn is_owned_by(&self, user: Uuid) -> bool {
        self.user == user
    }

    /// Private blogs are only visible to their owner.
    pub fn is_visible_to(&self, requester: Option<Uuid>) -> bool {
        self.status == BlogStatus::Public || requester.map_or(false, |u| self.is_owned_by(u))
    }

    /// Every stored media URL the blog references: title image first, then image blocks in order.
    pub fn image_urls(&self) -> Vec<String> {
        self.title_image
            .iter()
            .cloned()
            .chain(self.content.iter().filter_map(|b| match b {
                ContentBlock::Image(url) => Some(url.clone()),
                _ => None,
            }))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub user: Uuid,
    pub title: String,
    pub title_image: Option<String>,
    pub content: Vec<ContentBlock>,
    pub tags: Vec<String>,
    pub status: BlogStatus,
}

/// Partial update. `None` leaves the field untouched; `title_image: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct BlogPatch {
    pub title: Option<String>,
    pub title_image: Option<Option<String>>,
    pub content: Option<Vec<ContentBlock>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<BlogStatus>,
}

impl BlogPatch {
    pub fn apply_to(&self, blog: &mut Blog) {
        if let Some(title) = &self.title {
            blog.title = title.clone();
        }
        if let Some(title_image) = &self.title_image {
            blog.title_image = title_image.clone();
        }
        if let Some(content) = &self.content {
            blog.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            blog.tags = tags.clone();
        }
        if let Some(status) = self.status {
            blog.status = status;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorView {
    pub name: String,
    pub avatar: String,
}

impl AuthorView {
    pub fn for_name(name: &str) -> Self {
        let avatar: String = name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .flat_map(|c| c.to_uppercase())
            .collect();
        AuthorView {
            name: name.to_string(),
            avatar: if avatar.is_empty() { "?".to_string() } else { avatar },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublicBlog {
    #[serde(flatten)]
    pub blog: Blog,
    pub author: AuthorView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnBlog {
    #[serde(flatten)]
    pub blog: Blog,
    pub comment_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewCount {
    pub views: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBlog {
    pub success: bool,
    pub deleted_blog: Blog,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_blocks_use_type_value_shape() {
        let blocks = vec![
            ContentBlock::Subtitle("Intro".into()),
            ContentBlock::Text("world".into()),
            ContentBlock::Image("/uploads/a.png".into()),
        ];
        let v = serde_json::to_value(&blocks).unwrap();
        assert_eq!(
            v,
            json!([
                {"type": "subtitle", "value": "Intro"},
                {"type": "text", "value": "world"},
                {"type": "image", "value": "/uploads/a.png"}
            ])
        );
        let unknown = serde_json::from_value::<ContentBlock>(json!({"type": "video", "value": "x"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn status_ignores_case() {
        assert_eq!(serde_json::from_value::<BlogStatus>(json!("Private")).unwrap(), BlogStatus::Private);
        assert_eq!(serde_json::from_value::<BlogStatus>(json!(" PUBLIC ")).unwrap(), BlogStatus::Public);
        assert!(serde_json::from_value::<BlogStatus>(json!("draft")).is_err());
        assert_eq!(serde_json::to_value(BlogStatus::Private).unwrap(), json!("private"));
    }

    #[test]
    fn avatar_uses_initials() {
        assert_eq!(AuthorView::for_name("alice liddell").avatar, "AL");
        assert_eq!(AuthorView::for_name("bob").avatar, "B");
        assert_eq!(AuthorView::for_name("  ").avatar, "?");
    }

    #[test]
    fn private_blog_visible_to_owner_only() {
        let owner = Uuid::new_v4();
        let blog = Blog {
            id: Uuid::new_v4(),
            user: owner,
            title: "t".into(),
            title_image: Some("/uploads/title.png".into()),
            content: vec![ContentBlock::Text("a".into()), ContentBlock::Image("/uploads/b.png".into())],
            tags: vec!["General".into()],
            status: BlogStatus::Private,
            created_at: chrono::Utc::now(),
            views: 0,
            viewed_by: vec![],
            likes: vec![],
        };
        assert!(blog.is_visible_to(Some(owner)));
        assert!(!blog.is_visible_to(Some(Uuid::new_v4())));
        assert!(!blog.is_visible_to(None));
        assert_eq!(blog.image_urls(), vec!["/uploads/title.png".to_string(), "/uploads/b.png".to_string()]);
    }
}
