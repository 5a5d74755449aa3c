use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodehostError>;

#[derive(Error, Debug)]
pub enum CodehostError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported code host: {0}")]
    UnsupportedHost(String),

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}
