use thiserror::Error;

pub mod config;
pub mod models;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Insert failed: {0}")]
    Insert(String),

    #[error("Notification error: {0}")]
    Notification(String),
}
