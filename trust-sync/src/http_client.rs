//! `reqwest` implementation of the remote-fetch seam
//!
//! Endpoints, relative to the configured base URL:
//! - `GET {base}/{path}/version` returns JSON `{"version": "...", "newerAvailable": bool}`
//! - `GET {base}/{path}` returns the raw payload, version in `x-trust-version`

use async_trait::async_trait;
use std::time::Duration;

use crate::client::{DownloadedData, TrustDataClient, VersionCheck};
use crate::error::{TrustError, TrustResult};
use crate::progress::{DownloadProgress, ProgressObserver};

pub const VERSION_HEADER: &str = "x-trust-version";
pub const CURRENT_VERSION_HEADER: &str = "x-trust-current-version";

pub struct HttpTrustDataClient {
    client: reqwest::Client,
    base_url: String,
    path: String,
    material: &'static str,
}

impl HttpTrustDataClient {
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        path: &str,
        material: &'static str,
        timeout: Duration,
    ) -> TrustResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrustError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.trim_matches('/').to_string(),
            material,
        })
    }

    pub fn data_url(&self) -> String {
        format!("{}/{}", self.base_url, self.path)
    }

    pub fn version_url(&self) -> String {
        format!("{}/{}/version", self.base_url, self.path)
    }

    async fn get(&self, url: &str, current: Option<&str>) -> TrustResult<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(current) = current {
            request = request.header(CURRENT_VERSION_HEADER, current);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TrustError::Fetch(format!(
                "GET {} failed with status: {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl TrustDataClient for HttpTrustDataClient {
    async fn check_version(&self, current: Option<&str>) -> TrustResult<VersionCheck> {
        let url = self.version_url();
        let response = self.get(&url, current).await?;
        response
            .json::<VersionCheck>()
            .await
            .map_err(|e| TrustError::Fetch(format!("Malformed version response from {}: {}", url, e)))
    }

    async fn download(&self, progress: &dyn ProgressObserver) -> TrustResult<DownloadedData> {
        let url = self.data_url();
        let mut response = self.get(&url, None).await?;

        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TrustError::Fetch(format!("Response from {} lacks {} header", url, VERSION_HEADER))
            })?;

        let total_bytes = response.content_length();
        let mut payload = Vec::with_capacity(
            total_bytes
                .and_then(|total| usize::try_from(total).ok())
                .unwrap_or_default(),
        );
        while let Some(chunk) = response.chunk().await? {
            payload.extend_from_slice(&chunk);
            progress.on_progress(&DownloadProgress {
                material: self.material,
                received_bytes: payload.len() as u64,
                total_bytes,
            });
        }

        Ok(DownloadedData { version, payload })
    }
}
