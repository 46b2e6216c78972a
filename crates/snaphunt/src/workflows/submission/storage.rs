use std::time::Duration;

use serde::Deserialize;
use tokio::runtime::Runtime;
use uuid::Uuid;

use super::domain::{ImageFormat, ObjectKey};
use crate::config::StorageConfig;

/// Failure modes of the object store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object '{0}' not found")]
    NotFound(String),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Durable blob storage keyed by opaque object keys.
///
/// `put` stages bytes under a fresh, collision-free key; keys are never
/// reused across submissions. `fetch` exists so the workflow can hand the
/// reference image to the oracle as raw bytes; URL signing stays behind
/// `read_url` and is owned by the storage layer, not the workflow.
pub trait ObjectStore: Send + Sync {
    fn put(&self, bytes: &[u8], format: ImageFormat) -> Result<ObjectKey, StorageError>;
    fn fetch(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError>;
    /// Delete the object, reporting whether it existed. Best-effort callers
    /// treat any failure as retryable rather than fatal.
    fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError>;
    fn read_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError>;
}

/// Generate a fresh `submissions/{uuid}.{ext}` key for a staged upload.
pub fn fresh_submission_key(format: ImageFormat) -> ObjectKey {
    ObjectKey(format!("submissions/{}.{}", Uuid::new_v4(), format.extension()))
}

/// Store adapter talking to the S3-fronting storage gateway over HTTP.
///
/// The gateway owns buckets, credentials, and presigning; this adapter only
/// moves bytes and asks for time-limited read URLs. The async client is
/// wrapped behind the synchronous trait with an owned runtime.
pub struct HttpObjectStore {
    client: reqwest::Client,
    runtime: Runtime,
    base_url: String,
    api_token: Option<String>,
}

impl HttpObjectStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let runtime = Runtime::new().map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            runtime,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn object_url(&self, key: &ObjectKey) -> String {
        format!("{}/objects/{}", self.base_url, key.0)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn map_transport(err: reqwest::Error) -> StorageError {
        StorageError::Backend(err.to_string())
    }
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, bytes: &[u8], format: ImageFormat) -> Result<ObjectKey, StorageError> {
        let key = fresh_submission_key(format);
        let request = self
            .client
            .put(self.object_url(&key))
            .header(reqwest::header::CONTENT_TYPE, format.content_type())
            .body(bytes.to_vec());

        let response = self
            .runtime
            .block_on(self.authorize(request).send())
            .map_err(Self::map_transport)?;

        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "put '{}' returned status {}",
                key.0,
                response.status().as_u16()
            )));
        }
        Ok(key)
    }

    fn fetch(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError> {
        let request = self.client.get(self.object_url(key));
        let response = self
            .runtime
            .block_on(self.authorize(request).send())
            .map_err(Self::map_transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.0.clone()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "fetch '{}' returned status {}",
                key.0,
                response.status().as_u16()
            )));
        }

        self.runtime
            .block_on(response.bytes())
            .map(|bytes| bytes.to_vec())
            .map_err(Self::map_transport)
    }

    fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let request = self.client.delete(self.object_url(key));
        let response = self
            .runtime
            .block_on(self.authorize(request).send())
            .map_err(Self::map_transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "delete '{}' returned status {}",
                key.0,
                response.status().as_u16()
            )));
        }
        Ok(true)
    }

    fn read_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError> {
        let request = self
            .client
            .get(format!("{}/url", self.object_url(key)))
            .query(&[("ttl_secs", ttl.as_secs())]);

        let response = self
            .runtime
            .block_on(self.authorize(request).send())
            .map_err(Self::map_transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.0.clone()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "sign '{}' returned status {}",
                key.0,
                response.status().as_u16()
            )));
        }

        self.runtime
            .block_on(response.json::<SignedUrlResponse>())
            .map(|signed| signed.url)
            .map_err(|err| StorageError::Backend(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_submission_keys_are_unique_and_typed() {
        let first = fresh_submission_key(ImageFormat::Jpeg);
        let second = fresh_submission_key(ImageFormat::Jpeg);
        assert_ne!(first, second);
        assert!(first.0.starts_with("submissions/"));
        assert!(first.0.ends_with(".jpg"));
        assert!(fresh_submission_key(ImageFormat::Png).0.ends_with(".png"));
    }
}
