use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }

    pub fn io(context: &str, err: std::io::Error) -> Self { Self::Io(format!("{context}: {err}")) }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self { Self::Serde(err.to_string()) }
}
