use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Content package '{0}' not registered")]
    UnknownContent(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("Snapshot codec error: {0}")]
    SnapshotCodec(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// Whether the client-side shim should retry the request with the same
    /// session id and sequence number.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::SnapshotIo(_))
    }
}

impl From<rmp_serde::encode::Error> for TrackError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::SnapshotCodec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TrackError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::SnapshotCodec(err.to_string())
    }
}
