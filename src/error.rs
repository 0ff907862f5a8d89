use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error for {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid vote value {0:?}: expected an integer from 1 to 5")]
    InvalidVoteValue(String),

    #[error("Comment is empty")]
    EmptyComment,

    #[error("Comment is {len} characters long, the limit is {max}")]
    CommentTooLong { len: usize, max: usize },

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Corrupt state in {key}: {reason}")]
    CorruptState { key: String, reason: String },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StorageError),
}

/// Failures raised before a request reaches the store.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Unauthenticated: log in to rate or comment")]
    Unauthenticated,

    #[error("Comment rejected by moderation ({0})")]
    CommentRejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
