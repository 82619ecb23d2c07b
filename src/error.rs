use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Apartment not found: {id}")]
    ApartmentNotFound { id: String },

    #[error("Availability record {record_id} not found for apartment {apartment_id}")]
    RecordNotFound { apartment_id: String, record_id: u64 },

    #[error("Backend rejected the API token (unauthorized)")]
    Unauthorized,

    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl CalendarError {
    /// Whether the failed operation may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T, E = CalendarError> = std::result::Result<T, E>;
