// Error kinds surfaced by the task registry and its backends

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// A required field is missing or malformed. Raised before any backend call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced task id does not exist
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The underlying store failed
    #[error("Persistence error: {0:#}")]
    Persistence(eyre::Report),
}

impl RegistryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RegistryError::Validation(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        RegistryError::NotFound(id.into())
    }

    /// NotFound implies the task was removed elsewhere; callers may treat it as resolved.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

impl From<eyre::Report> for RegistryError {
    fn from(report: eyre::Report) -> Self {
        RegistryError::Persistence(report)
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RegistryError::validation("title is required").to_string(),
            "Validation error: title is required"
        );
        assert_eq!(RegistryError::not_found("abc").to_string(), "Task not found: abc");
    }

    #[test]
    fn test_report_converts_to_persistence() {
        let err: RegistryError = eyre::eyre!("disk full").into();
        assert!(matches!(err, RegistryError::Persistence(_)));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("disk full"));
    }
}
