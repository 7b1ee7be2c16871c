use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlastRadiusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Insight error: {0}")]
    Insight(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, BlastRadiusError>;
