use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("allocation failed: {0}")]
    AllocationFailure(&'static str),
    #[error("queue already belongs to a queue set")]
    AlreadyMember,
    #[error("item size must be greater than zero")]
    InvalidItemSize,
    #[error("item size mismatch: expected {expected} bytes, got {actual}")]
    ItemSize { expected: usize, actual: usize },
    #[error("queue or queue set is closed")]
    Closed,
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
