//! Error types for ripple.

use alloc::string::String;
use core::fmt;

/// Result type alias for ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for pipeline construction, source pushes and replica writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An AST named a table that the builder context cannot provide.
    SourceNotFound {
        name: String,
    },
    /// A column referenced by an ordering, key or condition does not exist.
    ColumnNotFound {
        table: String,
        column: String,
    },
    /// A subquery correlation could not be resolved against its tables.
    InvalidCorrelation {
        message: String,
    },
    /// A LIKE / ILIKE pattern could not be compiled.
    InvalidPattern {
        message: String,
    },
    /// A limit that is not a non-negative integer.
    InvalidLimit {
        limit: i64,
    },
    /// `add` of a row whose primary key is already present.
    RowExists {
        table: String,
        key: String,
    },
    /// `remove` or `edit` of a row whose primary key is not present.
    RowNotFound {
        table: String,
        key: String,
    },
    /// Unique constraint violation in the replica.
    UniqueViolation {
        table: String,
        constraint: String,
    },
    /// Table not found in the replica.
    TableNotFound {
        name: String,
    },
    /// Invalid schema definition.
    InvalidSchema {
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SourceNotFound { name } => write!(f, "Source not found: {}", name),
            Error::ColumnNotFound { table, column } => {
                write!(f, "Column {} not found in table {}", column, table)
            }
            Error::InvalidCorrelation { message } => {
                write!(f, "Invalid correlation: {}", message)
            }
            Error::InvalidPattern { message } => write!(f, "{}", message),
            Error::InvalidLimit { limit } => {
                write!(f, "Limit must be a non-negative integer, got {}", limit)
            }
            Error::RowExists { table, key } => {
                write!(f, "Row already exists in {}: {}", table, key)
            }
            Error::RowNotFound { table, key } => {
                write!(f, "Row not found in {}: {}", table, key)
            }
            Error::UniqueViolation { table, constraint } => {
                write!(
                    f,
                    "Unique constraint violation on {} ({})",
                    table, constraint
                )
            }
            Error::TableNotFound { name } => write!(f, "Table not found: {}", name),
            Error::InvalidSchema { message } => write!(f, "Invalid schema: {}", message),
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a source not found error.
    pub fn source_not_found(name: impl Into<String>) -> Self {
        Error::SourceNotFound { name: name.into() }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid correlation error.
    pub fn invalid_correlation(message: impl Into<String>) -> Self {
        Error::InvalidCorrelation {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Error::InvalidPattern {
            message: message.into(),
        }
    }

    /// Creates a row exists error.
    pub fn row_exists(table: impl Into<String>, key: impl Into<String>) -> Self {
        Error::RowExists {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates a row not found error.
    pub fn row_not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Error::RowNotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates a unique violation error.
    pub fn unique_violation(table: impl Into<String>, constraint: impl Into<String>) -> Self {
        Error::UniqueViolation {
            table: table.into(),
            constraint: constraint.into(),
        }
    }

    pub fn invalid_limit(limit: i64) -> Self {
        Error::InvalidLimit { limit }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
