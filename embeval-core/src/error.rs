use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Classifier fit failed: {0}")]
    Fit(String),

    #[error("No prompt defined for model '{model}' and task '{task}'")]
    Prompt { model: String, task: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yaml::Error),
}
