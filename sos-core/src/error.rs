use thiserror::Error;

pub type Result<T> = std::result::Result<T, SosError>;

#[derive(Error, Debug)]
pub enum SosError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
