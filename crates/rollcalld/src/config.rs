use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Bind address for the HTTP listener (default: 127.0.0.1:8080).
    pub http_bind: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Root directory of the filesystem blob store.
    pub blob_root: PathBuf,
    /// Base URL of the external face-model service.
    pub face_api_url: String,
    /// Deadline in seconds for embed/verify proxy calls.
    pub call_timeout_secs: u64,
    /// Deadline in seconds for reference-image fetches.
    pub fetch_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults. The face-service base URL is read once, here.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("rollcall")
            });

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("rollcall.db"));

        let blob_root = std::env::var("ROLLCALL_BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("blobs"));

        Self {
            http_bind: std::env::var("ROLLCALL_HTTP_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            db_path,
            blob_root,
            face_api_url: std::env::var("ROLLCALL_FACE_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8001".to_string()),
            call_timeout_secs: env_u64("ROLLCALL_EMBED_TIMEOUT_SECS", 120),
            fetch_timeout_secs: env_u64("ROLLCALL_FETCH_TIMEOUT_SECS", 30),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
