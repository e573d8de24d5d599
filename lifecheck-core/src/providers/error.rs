#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No active registry credential")]
    MissingCredential,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}
