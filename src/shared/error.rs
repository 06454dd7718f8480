use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuantiveError {
    #[error("{field} is required")]
    MissingValue { field: &'static str },

    #[error("{field} is still set to a placeholder value ({value})")]
    Placeholder { field: &'static str, value: String },

    #[error("API token appears too short ({len} characters, minimum {min})")]
    TokenTooShort { len: usize, min: usize },

    #[error("Session '{0}' not found in Quantive")]
    SessionNotFound(String),

    #[error("Quantive API returned {status} for {url} (body: {body})")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Invalid JSON from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Property store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuantiveError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            QuantiveError::Http { status, .. } => *status == 429 || *status >= 500,
            QuantiveError::Request(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, QuantiveError>;
