//! Download progress notifications (informational only)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub material: &'static str,
    pub received_bytes: u64,
    /// Known when the authority announces a content length
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Completion in percent, when the total size is known
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes.filter(|total| *total > 0)?;
        let percent = self.received_bytes.saturating_mul(100) / total;
        Some(u8::try_from(percent.min(100)).unwrap_or(100))
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &DownloadProgress);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _progress: &DownloadProgress) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, progress: &DownloadProgress) {
        tracing::debug!(
            material = progress.material,
            received_bytes = progress.received_bytes,
            total_bytes = ?progress.total_bytes,
            percent = ?progress.percent(),
            "Trust data download progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let mut progress = DownloadProgress {
            material: "revocation-list",
            received_bytes: 50,
            total_bytes: Some(200),
        };
        assert_eq!(progress.percent(), Some(25));

        progress.received_bytes = 400;
        assert_eq!(progress.percent(), Some(100));

        progress.total_bytes = None;
        assert_eq!(progress.percent(), None);

        progress.total_bytes = Some(0);
        assert_eq!(progress.percent(), None);
    }
}
