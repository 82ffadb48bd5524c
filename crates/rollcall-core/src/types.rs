use serde::{Deserialize, Serialize};

/// A registered face record.
///
/// `image_path` is either a blob store key (e.g. `user-faces/<uuid>.jpg`) or
/// an absolute HTTP(S) URL pointing at an externally hosted reference image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFace {
    pub id: i64,
    pub user_id: i64,
    pub image_path: String,
    /// Hex SHA-256 of the raw image bytes, for deduplication.
    pub image_hash: Option<String>,
    pub embedding: Option<Vec<f32>>,
    /// Model that produced the embedding (e.g. "ArcFace").
    pub embedding_model: String,
    pub embedding_dim: Option<i64>,
    pub is_primary: bool,
    pub metadata: Option<FaceMetadata>,
    pub created_at: String,
    pub updated_at: String,
}

/// Capture metadata recorded alongside a face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceMetadata {
    /// Storage backend identifier (e.g. "local").
    pub disk: String,
    /// Stored byte size.
    pub size: u64,
    /// MIME type of the uploaded image.
    pub mime: String,
}

/// A face record ready to be persisted. Created only after the embedding
/// call has succeeded.
#[derive(Debug, Clone)]
pub struct NewUserFace {
    pub user_id: i64,
    pub image_path: String,
    pub image_hash: Option<String>,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub embedding_dim: Option<i64>,
    pub is_primary: bool,
    pub metadata: FaceMetadata,
}

/// An upstream HTTP response forwarded to the original caller unchanged.
///
/// Kept deliberately separate from the local error taxonomy: a relayed
/// upstream failure is an answer, not a failure of this service.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RelayedResponse {
    /// Wrap an unparsable upstream body so the raw text survives the relay.
    pub fn wrap_raw(status: u16, raw: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "ok": false, "error": raw }),
        }
    }

    /// Upstream error detail: the body's `detail` (or `error`) field when
    /// present, otherwise the whole body rendered as a string.
    pub fn detail(&self) -> String {
        self.body
            .get("detail")
            .or_else(|| self.body.get("error"))
            .and_then(|d| d.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.body.to_string())
    }
}

/// Loosely parsed 2xx body of the model service's `/embed` endpoint.
/// Fields the upstream omits stay `None`; the orchestration layer decides
/// what is fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedResponse {
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub embedding_dim: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
}

/// An uploaded image file as received at the transport boundary.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Accepted upload formats for face images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// Detect the image format from content, not the client-supplied name.
/// Returns `None` for anything that is not jpg/jpeg/png.
pub fn sniff_image(bytes: &[u8]) -> Option<ImageKind> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some(ImageKind::Jpeg),
        image::ImageFormat::Png => Some(ImageKind::Png),
        _ => None,
    }
}
