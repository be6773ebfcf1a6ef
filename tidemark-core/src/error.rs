use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Transport failure, 5xx or throttling. The cycle ends early and is retried on the next one.
    #[error("Transient Fetch Error - {0}")]
    TransientFetch(String),

    #[error("Vendor Error - {0}")]
    Vendor(String),

    #[error("Malformed Response - {0}")]
    MalformedResponse(String),

    #[error("Storage Unavailable - {0}")]
    StorageUnavailable(String),

    #[error("Checkpoint Write Error - {0}")]
    CheckpointWrite(String),

    #[error("Corrupt Checkpoint - {0}")]
    CorruptCheckpoint(String),

    #[error("Sink Error - {0}")]
    Sink(String),

    #[error("Config Error - {0}")]
    Config(String),
}

impl Error {
    /// Whether the poll loop may carry on with the next cycle after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientFetch(_))
    }
}
