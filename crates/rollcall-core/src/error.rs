use crate::types::RelayedResponse;
use thiserror::Error;

/// Failures surfaced by the record store collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (primary-face race).
    #[error("conflicting write rejected by a storage constraint")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the blob store collaborator.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob store io: {0}")]
    Io(String),
}

/// Failures from the outbound face-service gateway. Non-2xx upstream
/// responses are NOT errors here; they come back as relays.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("upstream call exceeded its deadline")]
    Timeout,
    #[error("upstream transport: {0}")]
    Transport(String),
}

/// Error taxonomy for face registration and verification.
///
/// Every collaborator failure is translated into one of these at the
/// orchestration layer; raw transport or storage errors never reach the
/// HTTP boundary.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("user {0} not found")]
    UnknownUser(i64),
    #[error("user does not have a primary face registered")]
    NoPrimaryFace,
    /// The embedding service answered with a non-2xx response (or the
    /// transport failed); the relay carries its status and body.
    #[error("embedding service rejected the image (status {})", .0.status)]
    EmbeddingFailed(RelayedResponse),
    #[error("face service call timed out")]
    UpstreamTimeout,
    #[error("face service unreachable: {0}")]
    UpstreamUnavailable(String),
    /// Upstream reported success but returned no usable embedding.
    #[error("failed to compute embedding for the provided image")]
    InvalidEmbedding,
    #[error("failed to fetch reference image")]
    ReferenceFetchFailed,
    #[error("reference image not found in storage")]
    ReferenceNotFound,
    #[error("a concurrent registration already set a primary face")]
    Conflict,
    #[error("storage error")]
    Storage(#[source] StoreError),
    #[error("blob store error")]
    Blob(#[source] BlobError),
}

impl From<StoreError> for FaceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => FaceError::Conflict,
            other => FaceError::Storage(other),
        }
    }
}
