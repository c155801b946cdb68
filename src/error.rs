use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilsError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Shape error at '{path}': {message}")]
    Shape { path: String, message: String },
    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, UtilsError>;

// Helper conversions
impl From<::config::ConfigError> for UtilsError {
    fn from(e: ::config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl From<serde_json::Error> for UtilsError {
    fn from(e: serde_json::Error) -> Self { Self::Json(e.to_string()) }
}
