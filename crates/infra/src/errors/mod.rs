//! Conversions from external infrastructure errors into domain errors.

use bookwise_domain::BookwiseError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BookwiseError);

impl From<InfraError> for BookwiseError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BookwiseError> for InfraError {
    fn from(value: BookwiseError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let mapped = match &value {
            SqlError::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.clone().unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => {
                        BookwiseError::Database("database is busy".into())
                    }
                    ErrorCode::DatabaseLocked => {
                        BookwiseError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => BookwiseError::Database(format!(
                        "constraint violation: {message}"
                    )),
                    _ => BookwiseError::Database(message),
                }
            }
            SqlError::QueryReturnedNoRows => {
                BookwiseError::Database("query returned no rows".into())
            }
            other => BookwiseError::Database(other.to_string()),
        };

        InfraError(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(BookwiseError::Database(format!("connection pool error: {value}")))
    }
}
