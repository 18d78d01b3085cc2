use thiserror::Error;

/// Errors surfaced by a [`Store`](crate::store::Store) implementation.
///
/// Only [`StoreError::Connection`] is considered transient; the accessor
/// retries it forever and hands everything else back to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Errors surfaced by a [`Cluster`](crate::cluster::Cluster) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Cluster API error: {0}")]
    Api(String),

    #[error("Failed to decode cluster response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum JanitorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, JanitorError>;
