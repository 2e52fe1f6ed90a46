use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error taxonomy for the data-access layer.
///
/// `NotFound` is terminal for the current operation and never retried.
/// `Unavailable` is transient and retryable with backoff. `Concurrency`
/// (serialization failure / deadlock) should be retried once by the
/// caller. `Configuration` marks misconfiguration that is fatal at
/// startup, distinct from transient unavailability.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate value for {field}")]
    Duplicate { field: String },

    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization conflict: {0}")]
    Concurrency(String),

    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {} not found", entity, id))
    }

    pub fn duplicate(field: impl Into<String>) -> Self {
        Self::Duplicate {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Concurrency(_))
    }

    /// Translate a driver-level error into the taxonomy. PostgreSQL error
    /// codes: 23505 unique violation, 23xxx other constraint violations,
    /// 40001 serialization failure, 40P01 deadlock detected.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                match code.as_str() {
                    "23505" => Self::Duplicate {
                        field: db
                            .constraint()
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                    },
                    "40001" | "40P01" => Self::Concurrency(db.message().to_string()),
                    c if c.starts_with("23") || c.starts_with("22") => Self::Invalid {
                        field: db
                            .constraint()
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "value".to_string()),
                        message: db.message().to_string(),
                    },
                    _ => Self::Unavailable(err.to_string()),
                }
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let e = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(e, DatabaseError::NotFound(_)));
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let e = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(e, DatabaseError::Unavailable(_)));
        assert!(e.is_retryable());
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(
            DatabaseError::duplicate("slug").to_string(),
            "Duplicate value for slug"
        );
        assert_eq!(
            DatabaseError::invalid("limit", "must be positive").to_string(),
            "Invalid limit: must be positive"
        );
    }
}
