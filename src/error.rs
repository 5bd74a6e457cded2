#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Scheduler already running")]
    AlreadyInitialized,

    #[error("Scheduler not running")]
    NotInitialized,

    #[error("Invalid stack size: {size}. Minimum size is {min} bytes")]
    InvalidStackSize { size: usize, min: usize },

    #[error("Stack allocation failed")]
    StackAllocation,

    #[error("System resource error: {0}")]
    SystemResource(String),

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Null item")]
    NullItem,

    #[error("Item not found in queue")]
    ItemNotFound,
}

impl Error {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::AlreadyInitialized
            | Error::NotInitialized
            | Error::InvalidStackSize { .. } => false,
            Error::StackAllocation
            | Error::SystemResource(_)
            | Error::QueueEmpty
            | Error::NullItem
            | Error::ItemNotFound => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
