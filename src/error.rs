//! Crate-wide error type.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("invalid year input {input:?}: {reason}")]
    InvalidYear { input: String, reason: &'static str },

    #[error("invalid month input {input:?}: {reason}")]
    InvalidMonth { input: String, reason: &'static str },

    #[error("malformed report row: {0}")]
    MalformedRow(&'static str),
}
