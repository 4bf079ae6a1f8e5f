use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::http_error::{AppError, FieldError};
use crate::media::{placeholder_for, UploadedFile};
use crate::plugins::blog::content::split_tag_field;
use crate::plugins::blog::models::{BlogStatus, ContentBlock};

pub const TITLE_IMAGE_FIELD: &str = "titleImage";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Csv(String),
}

impl TagInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TagInput::List(list) => list,
            TagInput::Csv(s) => split_tag_field(&s),
        }
    }
}

/// Blog fields as sent by the client. Every field is optional here; create
/// and update decide which ones are required.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPayload {
    pub title: Option<String>,
    pub content: Option<Vec<ContentBlock>>,
    #[serde(default, alias = "tags", deserialize_with = "tags_opt")]
    pub tag: Option<Vec<String>>,
    #[serde(alias = "blogstatus")]
    pub status: Option<BlogStatus>,
    pub title_image: Option<String>,
}

fn tags_opt<'de, D>(de: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<TagInput>::deserialize(de)?.map(TagInput::into_vec))
}

/// A blog write body: JSON, or multipart with file parts for image placeholders.
#[derive(Debug, Default)]
pub struct BlogSubmission {
    pub payload: BlogPayload,
    pub files: HashMap<String, UploadedFile>,
}

impl BlogSubmission {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut submission = BlogSubmission::default();
        let mut tags: Option<Vec<String>> = None;
        let mut errors: Vec<FieldError> = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("multipart read error: {}", e)))?;
                // browsers send an empty part for an untouched file input
                if data.is_empty() || name.is_empty() {
                    continue;
                }
                if name == TITLE_IMAGE_FIELD {
                    submission.payload.title_image = Some(placeholder_for(TITLE_IMAGE_FIELD));
                }
                submission.files.insert(name, UploadedFile { file_name, data });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(format!("multipart read error: {}", e)))?;
            match name.as_str() {
                "title" => submission.payload.title = Some(value),
                "content" => match serde_json::from_str::<Vec<ContentBlock>>(&value) {
                    Ok(blocks) => submission.payload.content = Some(blocks),
                    Err(e) => errors.push(FieldError::new("content", format!("content must be a JSON array of blocks: {e}"))),
                },
                "tag" | "tags" => tags.get_or_insert_with(Vec::new).extend(split_tag_field(&value)),
                "status" | "blogstatus" => match BlogStatus::parse(&value) {
                    Some(status) => submission.payload.status = Some(status),
                    None => errors.push(FieldError::new("status", "status must be public or private")),
                },
                TITLE_IMAGE_FIELD => {
                    // an uploaded title image wins over a URL field
                    if !submission.files.contains_key(TITLE_IMAGE_FIELD) {
                        submission.payload.title_image = Some(value.trim().to_string());
                    }
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }
        submission.payload.tag = tags;
        Ok(submission)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for BlogSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }
        let Json(payload) = Json::<BlogPayload>::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        Ok(BlogSubmission { payload, files: HashMap::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    #[test]
    fn json_payload_accepts_aliases() {
        let payload: BlogPayload = serde_json::from_value(json!({
            "title": "Hello",
            "content": [{"type": "text", "value": "world"}],
            "tags": "a, b",
            "blogstatus": "private"
        }))
        .unwrap();
        assert_eq!(payload.tag, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(payload.status, Some(BlogStatus::Private));
        assert!(payload.title_image.is_none());
    }

    #[test]
    fn json_and_form_status_follow_one_rule() {
        let payload: BlogPayload = serde_json::from_value(json!({"status": "Private"})).unwrap();
        assert_eq!(payload.status, Some(BlogStatus::Private));
        assert_eq!(payload.status, BlogStatus::parse("Private"));
        assert!(serde_json::from_value::<BlogPayload>(json!({"status": "hidden"})).is_err());
    }

    #[tokio::test]
    async fn multipart_body_collects_fields_and_files() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\n[{{\"type\":\"image\",\"value\":\"upload:img0\"}}]\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\nrust,web\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"img0\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"titleImage\"; filename=\"t.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nJPG\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let submission = BlogSubmission::from_request(req, &()).await.unwrap();
        assert_eq!(submission.payload.title.as_deref(), Some("Hello"));
        assert_eq!(submission.payload.tag, Some(vec!["rust".to_string(), "web".to_string()]));
        assert_eq!(submission.payload.title_image.as_deref(), Some("upload:titleImage"));
        assert_eq!(submission.files.len(), 2);
        assert_eq!(&submission.files["img0"].data[..], b"PNG");
    }
}
