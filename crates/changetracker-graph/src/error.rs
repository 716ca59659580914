use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph HTTP {status}\nURL: {url}\n{body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No field mapping defined for list \"{0}\"")]
    MissingMapping(String),

    #[error("Invalid site URL: {0}")]
    InvalidSiteUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
