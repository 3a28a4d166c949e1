use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::errors::TapFlowResult;

/// Object-storage seam for screenshot uploads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the bytes and returns a public URL. Uploads are
    /// content-addressed, so re-uploading identical bytes is cheap.
    async fn upload(&self, bytes: &[u8], suffix: &str) -> TapFlowResult<String>;
}

/// Minimal HTTP object-store client (S3-style PUT/HEAD semantics). Object
/// keys are derived from a blake3 hash of the content so duplicate
/// screenshots map to the same key.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    public_base: String,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let public_base = config
            .public_base
            .clone()
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/{}", endpoint, config.bucket));
        Self {
            client: reqwest::Client::new(),
            endpoint,
            bucket: config.bucket.clone(),
            public_base,
        }
    }

    fn object_key(bytes: &[u8], suffix: &str) -> String {
        format!("tapflow/{}{}", blake3::hash(bytes).to_hex(), suffix)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, bytes: &[u8], suffix: &str) -> TapFlowResult<String> {
        let key = Self::object_key(bytes, suffix);
        let object_url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        let public_url = format!("{}/{}", self.public_base, key);

        let head = self.client.head(&object_url).send().await?;
        if head.status().is_success() {
            tracing::debug!(key = %key, "object already stored, skipping upload");
            return Ok(public_url);
        }

        self.client
            .put(&object_url)
            .body(bytes.to_vec())
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(key = %key, size = bytes.len(), "screenshot uploaded");
        Ok(public_url)
    }
}
