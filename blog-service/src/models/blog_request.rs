//! Typed view of a `/generate` payload.
//!
//! Validation runs against the raw JSON value so that the rules are checked
//! in a fixed order and each failure carries its own client-facing reason.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Keys that must be present before any other rule is checked.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "content_type",
    "target_audience",
    "keywords",
    "blog_length",
    "tone",
];

/// Reason a payload was rejected. The display text is sent to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing parameters in request")]
    MissingParameters,

    #[error("Keywords should be a list with at least one keyword")]
    InvalidKeywords,

    #[error("Blog length should be a positive integer")]
    InvalidBlogLength,

    #[error("Additional instructions should be a list")]
    InvalidAdditionalInstructions,

    #[error("Tone should be alphanumeric")]
    InvalidTone,
}

/// A fully validated blog generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogRequest {
    /// Kind of post, e.g. "listicle" or "how-to".
    pub content_type: String,
    pub target_audience: String,
    /// Never empty.
    pub keywords: Vec<String>,
    /// Target word count, at least 1.
    pub blog_length: u64,
    /// ASCII letters, digits and underscores only. May be empty.
    pub tone: String,
    pub additional_instructions: Vec<String>,
}

impl BlogRequest {
    /// Validate a decoded JSON body, stopping at the first rule that fails.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let fields = value.as_object().ok_or(ValidationError::MissingParameters)?;

        if !REQUIRED_FIELDS.iter().all(|key| fields.contains_key(*key)) {
            return Err(ValidationError::MissingParameters);
        }

        let keywords = string_list(&fields["keywords"])
            .filter(|keywords| !keywords.is_empty())
            .ok_or(ValidationError::InvalidKeywords)?;

        let blog_length = fields["blog_length"]
            .as_u64()
            .filter(|length| *length >= 1)
            .ok_or(ValidationError::InvalidBlogLength)?;

        let additional_instructions = match fields.get("additional_instructions") {
            Some(value) => {
                string_list(value).ok_or(ValidationError::InvalidAdditionalInstructions)?
            }
            None => Vec::new(),
        };

        let tone = fields["tone"]
            .as_str()
            .filter(|tone| is_valid_tone(tone))
            .ok_or(ValidationError::InvalidTone)?
            .to_string();

        Ok(Self {
            content_type: free_text(fields, "content_type"),
            target_audience: free_text(fields, "target_audience"),
            keywords,
            blog_length,
            tone,
            additional_instructions,
        })
    }
}

/// `^[a-zA-Z0-9_]*$`, anchored at both ends with no allowance for a trailing
/// newline, so `"friendly\n"` is rejected.
pub fn is_valid_tone(tone: &str) -> bool {
    tone.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An array whose items are all strings.
fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Free-form fields accept any JSON value; non-strings are rendered as JSON text.
fn free_text(fields: &Map<String, Value>, key: &str) -> String {
    match &fields[key] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
