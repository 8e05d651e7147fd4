use serde::{Deserialize, Serialize};

/// Body of a successful `/generate` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Provider output with surrounding whitespace removed.
    pub generated_text: String,
}

impl GenerateResponse {
    pub fn from_completion(text: &str) -> Self {
        Self {
            generated_text: text.trim().to_string(),
        }
    }
}
