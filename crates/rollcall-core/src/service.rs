//! Face registration and verification orchestration.
//!
//! Register: validate → store blob → embed upstream → persist record,
//! deleting the blob again if the embedding never materializes.
//! Verify: resolve the primary reference image → proxy to upstream →
//! relay the answer.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::client::{EmbedOptions, EmbedOutcome, FaceGateway, FilePart, VerifyOptions};
use crate::error::{BlobError, FaceError, GatewayError, StoreError};
use crate::types::{sniff_image, FaceMetadata, ImageKind, ImageUpload, NewUserFace, RelayedResponse, UserFace};

/// Model forwarded upstream when the caller names none.
pub const DEFAULT_MODEL_NAME: &str = "ArcFace";
/// Detector backend forwarded upstream when the caller names none.
pub const DEFAULT_DETECTOR_BACKEND: &str = "retinaface";
/// Distance metric forwarded on verification when the caller names none.
pub const DEFAULT_DISTANCE_METRIC: &str = "cosine";

/// Blob namespace for registered face images.
const FACE_NAMESPACE: &str = "user-faces";

/// User directory collaborator: answers whether a user id is known.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: i64) -> Result<bool, StoreError>;
}

/// Face record store collaborator.
///
/// `clear_primary` must complete before a primary `create`; the store's
/// partial unique index backstops the one-primary-per-user invariant and
/// surfaces a lost race as [`StoreError::Conflict`].
#[async_trait]
pub trait FaceRecords: Send + Sync {
    async fn find_primary(&self, user_id: i64) -> Result<Option<UserFace>, StoreError>;
    async fn clear_primary(&self, user_id: i64) -> Result<(), StoreError>;
    async fn create(&self, record: NewUserFace) -> Result<UserFace, StoreError>;
}

/// Content-addressed blob store collaborator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh key in `namespace`; returns the key.
    async fn put(&self, bytes: &[u8], namespace: &str, extension: &str) -> Result<String, BlobError>;
    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;
    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
    async fn delete(&self, path: &str) -> Result<(), BlobError>;
    async fn size(&self, path: &str) -> Result<u64, BlobError>;
    /// Backend identifier recorded in face metadata (e.g. "local").
    fn backend(&self) -> &str;
}

/// Inputs for [`FaceService::register`].
#[derive(Debug)]
pub struct RegisterRequest {
    pub user_id: i64,
    pub image: ImageUpload,
    pub is_primary: bool,
    pub model_name: Option<String>,
    pub detector_backend: Option<String>,
}

/// Inputs for [`FaceService::verify`].
#[derive(Debug)]
pub struct VerifyRequest {
    pub user_id: i64,
    pub image: ImageUpload,
    pub model_name: Option<String>,
    pub detector_backend: Option<String>,
    pub distance_metric: Option<String>,
    pub threshold: Option<f64>,
}

/// Orchestrates face registration and verification across the record store,
/// the blob store and the external embedding service.
pub struct FaceService {
    users: Arc<dyn UserDirectory>,
    faces: Arc<dyn FaceRecords>,
    blobs: Arc<dyn BlobStore>,
    gateway: Arc<dyn FaceGateway>,
}

impl FaceService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        faces: Arc<dyn FaceRecords>,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<dyn FaceGateway>,
    ) -> Self {
        Self {
            users,
            faces,
            blobs,
            gateway,
        }
    }

    /// Register a face for a user: store the image, obtain its embedding
    /// from the model service, persist the record. The row is only created
    /// after the embedding succeeds; on any upstream failure the stored
    /// blob is removed again.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserFace, FaceError> {
        if !self.users.exists(req.user_id).await? {
            return Err(FaceError::UnknownUser(req.user_id));
        }
        let kind = validate_image(&req.image)?;

        let path = self
            .blobs
            .put(&req.image.bytes, FACE_NAMESPACE, kind.extension())
            .await
            .map_err(FaceError::Blob)?;
        let hash = hex_sha256(&req.image.bytes);
        tracing::debug!(user_id = req.user_id, path = %path, "face image stored");

        let model_name = req
            .model_name
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        let opts = EmbedOptions {
            model_name: model_name.clone(),
            detector_backend: req
                .detector_backend
                .clone()
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
        };
        let part = FilePart {
            bytes: req.image.bytes.clone(),
            filename: basename(&path).to_string(),
        };

        let outcome = match self.gateway.embed(part, &opts).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.discard_blob(&path).await;
                return Err(match err {
                    GatewayError::Timeout => FaceError::UpstreamTimeout,
                    GatewayError::Transport(detail) => {
                        FaceError::EmbeddingFailed(RelayedResponse::wrap_raw(502, &detail))
                    }
                });
            }
        };

        let reply = match outcome {
            EmbedOutcome::Embedded(reply) => reply,
            EmbedOutcome::Refused(relay) => {
                tracing::warn!(
                    user_id = req.user_id,
                    status = relay.status,
                    "embedding service refused image"
                );
                self.discard_blob(&path).await;
                return Err(FaceError::EmbeddingFailed(relay));
            }
        };

        let embedding = match reply.embedding {
            Some(values) if !values.is_empty() => values,
            _ => {
                self.discard_blob(&path).await;
                return Err(FaceError::InvalidEmbedding);
            }
        };

        if req.is_primary {
            self.faces.clear_primary(req.user_id).await?;
        }

        let size = self.blobs.size(&path).await.map_err(FaceError::Blob)?;
        let face = self
            .faces
            .create(NewUserFace {
                user_id: req.user_id,
                image_path: path,
                image_hash: Some(hash),
                embedding,
                embedding_model: reply.model.unwrap_or(model_name),
                embedding_dim: reply.embedding_dim,
                is_primary: req.is_primary,
                metadata: FaceMetadata {
                    disk: self.blobs.backend().to_string(),
                    size,
                    mime: kind.mime().to_string(),
                },
            })
            .await?;

        tracing::info!(
            user_id = face.user_id,
            face_id = face.id,
            is_primary = face.is_primary,
            "face registered"
        );
        Ok(face)
    }

    /// Verify a newly captured image against the user's primary face and
    /// relay the model service's answer, whatever its status.
    pub async fn verify(&self, req: VerifyRequest) -> Result<RelayedResponse, FaceError> {
        if !self.users.exists(req.user_id).await? {
            return Err(FaceError::UnknownUser(req.user_id));
        }
        validate_image(&req.image)?;

        let primary = self
            .faces
            .find_primary(req.user_id)
            .await?
            .ok_or(FaceError::NoPrimaryFace)?;

        let reference = self.resolve_reference(&primary).await?;

        let opts = VerifyOptions {
            model_name: req
                .model_name
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            detector_backend: req
                .detector_backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            distance_metric: req
                .distance_metric
                .unwrap_or_else(|| DEFAULT_DISTANCE_METRIC.to_string()),
            threshold: req.threshold,
        };
        let query = FilePart {
            bytes: req.image.bytes,
            filename: req.image.filename,
        };

        match self.gateway.verify(reference, query, &opts).await {
            Ok(relay) => {
                tracing::info!(
                    user_id = req.user_id,
                    status = relay.status,
                    "verification relayed"
                );
                Ok(relay)
            }
            Err(GatewayError::Timeout) => Err(FaceError::UpstreamTimeout),
            Err(GatewayError::Transport(detail)) => Err(FaceError::UpstreamUnavailable(detail)),
        }
    }

    /// Resolve the primary face's reference bytes: absolute HTTP(S) URLs
    /// are fetched outbound, anything else is a blob store key.
    async fn resolve_reference(&self, primary: &UserFace) -> Result<FilePart, FaceError> {
        let filename = basename(&primary.image_path).to_string();

        if is_http_url(&primary.image_path) {
            let bytes = self.gateway.fetch(&primary.image_path).await.map_err(|err| {
                tracing::warn!(
                    url = %primary.image_path,
                    error = %err,
                    "reference image fetch failed"
                );
                FaceError::ReferenceFetchFailed
            })?;
            return Ok(FilePart { bytes, filename });
        }

        if !self
            .blobs
            .exists(&primary.image_path)
            .await
            .map_err(FaceError::Blob)?
        {
            return Err(FaceError::ReferenceNotFound);
        }
        let bytes = self
            .blobs
            .get(&primary.image_path)
            .await
            .map_err(|err| match err {
                BlobError::NotFound(_) => FaceError::ReferenceNotFound,
                other => FaceError::Blob(other),
            })?;
        Ok(FilePart { bytes, filename })
    }

    /// Best-effort removal of a blob written during a failed registration.
    /// Failure is logged, never propagated: the primary error must survive.
    async fn discard_blob(&self, path: &str) {
        if let Err(err) = self.blobs.delete(path).await {
            tracing::warn!(path = %path, error = %err, "cleanup of stored face image failed");
        }
    }
}

fn validate_image(image: &ImageUpload) -> Result<ImageKind, FaceError> {
    if image.bytes.is_empty() {
        return Err(FaceError::InvalidInput("image file is required".to_string()));
    }
    sniff_image(&image.bytes)
        .ok_or_else(|| FaceError::InvalidInput("image must be a jpg, jpeg or png file".to_string()))
}

fn is_http_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn hex_sha256(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
