use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid dump: {0}")]
    InvalidDump(String),
}

pub type Result<T> = std::result::Result<T, Error>;
