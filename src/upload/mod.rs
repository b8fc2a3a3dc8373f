//! Remote Uploader
//!
//! Optionally mirrors a completed, validated bundle to remote object
//! storage, object-by-object, keyed by the bundle's relative paths. Upload
//! failures are reported as warnings on the run result; they never
//! invalidate the local bundle.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::UploadConfig;
use crate::constants::network::CONNECTION_TIMEOUT_SECS;
use crate::types::{ArtifactManifest, Result, SnapError};

/// Object-store upload capability
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Store one object under the given key
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Uploader name for logging
    fn name(&self) -> &str;
}

pub type SharedUploader = Arc<dyn Uploader + Send + Sync>;

/// HTTP object-store uploader (PUT against a base URL)
pub struct HttpUploader {
    base: Url,
    auth_token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUploader")
            .field("base", &self.base.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpUploader {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| SnapError::Config("upload endpoint not configured".to_string()))?;

        // Url::join drops the last path segment without a trailing slash
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| SnapError::Config(format!("invalid upload endpoint: {}", e)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| SnapError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base,
            auth_token: config.auth_token.clone().map(SecretString::from),
            client,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let url = self
            .base
            .join(key)
            .map_err(|e| SnapError::Upload(format!("invalid object key '{}': {}", key, e)))?;

        let mut request = self.client.put(url).body(bytes.to_vec());
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SnapError::Upload(format!("PUT {} failed: {}", key, e)))?;

        if !response.status().is_success() {
            return Err(SnapError::Upload(format!(
                "PUT {} returned {}",
                key,
                response.status()
            )));
        }

        debug!(key, "object uploaded");
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Mirror every manifest entry (plus the manifest itself) from a local
/// bundle, keyed by `<prefix>/<relative_path>`.
///
/// Returns accumulated warnings; per-object failures never abort the
/// mirror and never fail the run.
#[instrument(skip(uploader, manifest), fields(entries = manifest.entries.len()))]
pub async fn mirror_bundle(
    uploader: &dyn Uploader,
    bundle_dir: &Path,
    prefix: &str,
    manifest: &ArtifactManifest,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut paths: Vec<&str> = manifest
        .entries
        .iter()
        .map(|e| e.relative_path.as_str())
        .collect();
    paths.push("manifest.json");

    for relative in paths {
        let local = bundle_dir.join(relative);
        let bytes = match std::fs::read(&local) {
            Ok(b) => b,
            Err(e) => {
                warnings.push(format!("upload skipped, cannot read {}: {}", relative, e));
                continue;
            }
        };

        let key = format!("{}/{}", prefix.trim_end_matches('/'), relative);
        if let Err(e) = uploader.put_object(&key, &bytes).await {
            warn!(key, error = %e, "object upload failed");
            warnings.push(e.to_string());
        }
    }

    if warnings.is_empty() {
        info!("bundle mirrored");
    } else {
        warn!(failures = warnings.len(), "bundle mirrored with failures");
    }

    warnings
}
