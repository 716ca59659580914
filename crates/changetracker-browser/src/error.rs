use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Frame is detached")]
    FrameDetached,

    #[error("Embedded frame unavailable: {0}")]
    FrameUnavailable(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Click on {0} was intercepted by another element")]
    Intercepted(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Failed to decode script result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

impl Error {
    /// Whether this error aborts the whole scrape rather than one view or row
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FrameUnavailable(_) | Error::Browser(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
