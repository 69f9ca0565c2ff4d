use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("recipe generation is not configured (missing API key)")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("generation API returned no text")]
    EmptyResponse,

    #[error("response is not valid JSON: {0}")]
    Parse(String),

    #[error("response does not match the recipe schema: {0}")]
    Schema(String),
}
