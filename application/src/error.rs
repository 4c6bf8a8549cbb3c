use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ApplicationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApplicationError::Validation(errors.to_string())
    }
}
