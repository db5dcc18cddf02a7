//! Repository error types
//!
//! Errors carry the failed operation, a category and, where known, the
//! entity type and identifier involved. The HTTP layer maps the category to
//! a status code and decides how much of the message reaches the client.
//!
//! # Example
//!
//! ```rust
//! use natours::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("Tour", "tour_01h455vb4pex5vsknk084sn02q");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single document by ID
    FindById,
    /// Finding the first document matching filters
    FindOne,
    /// Finding documents with filters, sort and pagination
    FindAll,
    /// Counting documents matching filters
    Count,
    /// Creating a new document
    Create,
    /// Updating an existing document
    Update,
    /// Deleting a document
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindById => write!(f, "find_by_id"),
            Self::FindOne => write!(f, "find_one"),
            Self::FindAll => write!(f, "find_all"),
            Self::Count => write!(f, "count"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Document was not found
    NotFound,
    /// A unique field already holds this value
    AlreadyExists,
    /// Schema validation failed
    ValidationFailed,
    /// The identifier is malformed for this collection
    InvalidId,
    /// Serialization or deserialization error
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::InvalidId => write!(f, "invalid_id"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Tour", "User")
    pub entity_type: Option<String>,
    /// The ID (or offending value) of the entity involved
    pub entity_id: Option<String>,
}

impl std::error::Error for RepositoryError {}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::FindById,
            kind: RepositoryErrorKind::NotFound,
            message: "Document not found".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create an "already exists" error for a duplicate unique `field`
    pub fn already_exists(
        entity_type: impl Into<String>,
        field: &str,
        value: impl Into<String>,
    ) -> Self {
        Self {
            operation: RepositoryOperation::Create,
            kind: RepositoryErrorKind::AlreadyExists,
            message: format!("Duplicate value for unique field '{field}'"),
            entity_type: Some(entity_type.into()),
            entity_id: Some(value.into()),
        }
    }

    /// Create a validation failed error
    ///
    /// # Example
    ///
    /// ```rust
    /// use natours::repository::RepositoryError;
    ///
    /// let error = RepositoryError::validation_failed("A tour must have a name");
    /// assert_eq!(error.message, "A tour must have a name");
    /// ```
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Create,
            kind: RepositoryErrorKind::ValidationFailed,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create an error for an identifier that cannot belong to this collection
    pub fn invalid_id(entity_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::FindById,
            kind: RepositoryErrorKind::InvalidId,
            message: "Malformed identifier".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(value.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::SerializationError,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = RepositoryError::not_found("Tour", "tour_x");
        assert_eq!(
            error.to_string(),
            "Repository not_found error during find_by_id: Document not found [Tour: tour_x]"
        );
    }

    #[test]
    fn test_already_exists_keeps_value() {
        let error = RepositoryError::already_exists("User", "email", "jonas@example.io")
            .with_operation(RepositoryOperation::Update);
        assert_eq!(error.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(error.operation, RepositoryOperation::Update);
        assert_eq!(error.entity_id.as_deref(), Some("jonas@example.io"));
        assert!(error.message.contains("email"));
    }

    #[test]
    fn test_validation_failed_has_no_entity() {
        let error = RepositoryError::validation_failed("Rating must be below 5.0");
        assert!(error.entity_type.is_none());
        assert!(!error.to_string().contains('['));
    }
}
