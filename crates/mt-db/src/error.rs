use mt_core::ValidationError;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database, including a failed or aborted transaction.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Input rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A derived row that must exist is missing. The transaction was rolled back.
    #[error("consistency error: expected {entity} {key} to exist")]
    Consistency { entity: &'static str, key: String },

    /// The referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {entity} {id}: {timestamp}")]
    TimestampParse {
        entity: &'static str,
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A stored row holds a value the domain types reject.
    #[error("invalid {entity} row {id}: {message}")]
    InvalidRow {
        entity: &'static str,
        id: String,
        message: String,
    },
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn missing(entity: &'static str, key: impl ToString) -> Self {
        Self::Consistency {
            entity,
            key: key.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
