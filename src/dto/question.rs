//! DTO definitions of the question bank API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::QuestionPatchEntity,
    dto::format_system_time,
    state::game::Question,
};

/// Question as returned to the host.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct QuestionSummary {
    /// Question id.
    pub id: Uuid,
    /// Prompt shown on screen.
    pub prompt: String,
    /// Expected answer.
    pub answer: String,
    /// Optional media clip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<Question> for QuestionSummary {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            answer: value.answer,
            clip_url: value.clip_url,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Payload adding a question to the bank.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateQuestionRequest {
    /// Prompt shown on screen.
    #[validate(length(min = 1, max = 500))]
    pub prompt: String,
    /// Expected answer.
    #[validate(length(min = 1, max = 200))]
    pub answer: String,
    /// Optional http(s) media clip.
    #[serde(default)]
    #[validate(url)]
    pub clip_url: Option<String>,
}

/// Partial update of a question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateQuestionRequest {
    /// New prompt, untouched when absent.
    #[serde(default)]
    #[validate(length(min = 1, max = 500))]
    pub prompt: Option<String>,
    /// New answer, untouched when absent.
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub answer: Option<String>,
    /// If not specified, does not change it.
    /// If null is specified, removes the clip.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub clip_url: Option<Option<String>>,
}

impl UpdateQuestionRequest {
    /// Check the clip URL, which `validator` cannot reach through two options.
    pub fn clip_url_is_valid(&self) -> bool {
        match &self.clip_url {
            Some(Some(url)) => url.starts_with("http://") || url.starts_with("https://"),
            _ => true,
        }
    }
}

impl From<UpdateQuestionRequest> for QuestionPatchEntity {
    fn from(value: UpdateQuestionRequest) -> Self {
        Self {
            prompt: value.prompt,
            answer: value.answer,
            clip_url: value.clip_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_clip_is_distinguished_from_missing_clip() {
        let cleared: UpdateQuestionRequest =
            serde_json::from_str(r#"{"clip_url": null}"#).unwrap();
        assert_eq!(cleared.clip_url, Some(None));

        let untouched: UpdateQuestionRequest = serde_json::from_str(r#"{"answer": "x"}"#).unwrap();
        assert_eq!(untouched.clip_url, None);
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let request = CreateQuestionRequest {
            prompt: String::new(),
            answer: "a".into(),
            clip_url: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn clip_url_must_be_http() {
        let request: UpdateQuestionRequest =
            serde_json::from_str(r#"{"clip_url": "ftp://nope"}"#).unwrap();
        assert!(!request.clip_url_is_valid());
    }
}
