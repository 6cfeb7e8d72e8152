/// Failures of the SQLite store.
///
/// `Store` methods return `anyhow::Result` like the matcher ports they back;
/// these variants are what ends up inside, so callers can downcast.
///
/// # Examples
///
/// ```rust
/// use ecocal_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "category_rule",
///     id: "417".to_string(),
/// };
/// assert!(err.to_string().contains("category_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage: no {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique-key conflict was reported but the conflicting row is gone.
    #[error("Storage: conflicting {entity} row vanished before it could be read")]
    ConflictVanished { entity: &'static str },

    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A stored column holds a value the domain types cannot represent.
    #[error("Storage: invalid value '{value}' in column '{column}'")]
    InvalidColumn { column: &'static str, value: String },

    /// Caller-supplied data was rejected before touching the database.
    #[error("Storage: invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
