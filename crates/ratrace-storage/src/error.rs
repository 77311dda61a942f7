//! Error types for the storage boundary.

/// Errors a [`RoomStore`](crate::RoomStore) implementation can report.
///
/// Callers log these at the boundary and carry on — persistence is
/// best-effort by design.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store rejected or lost the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The persisted data could not be interpreted.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
