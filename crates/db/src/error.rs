/// Failure talking to the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query failed at the database level.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backend refused the operation (used by the in-process store).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
