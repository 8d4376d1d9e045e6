//! Request DTOs
//!
//! Input is validated here, before any store is reached.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use feed_core::MAX_CONTENT_CHARS;

/// Create post request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(
        length(min = 1, max = 140, message = "Post must be 1-140 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

impl CreatePostRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

fn not_blank(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Post must not be blank".into());
        return Err(err);
    }
    Ok(())
}

// The derive attribute needs a literal; keep it in step with the domain rule
const _: () = assert!(MAX_CONTENT_CHARS == 140);
