use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found")]
    NotFound,
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Query error: {0}")]
    QueryError(String),
    #[error("Database operation failed: {0}")]
    OperationFailed(String),
}
