//! UploadRetrier: uploads a sealed payload until the store accepts it.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{BackoffPolicy, retry_until_ok};
use crate::ports::{Metrics, Uploader};

const UPLOAD_LABEL: &str = "upload";

/// Wraps an [`Uploader`] with unbounded exponential backoff.
pub struct UploadRetrier {
    uploader: Arc<dyn Uploader>,
    policy: BackoffPolicy,
    metrics: Arc<dyn Metrics>,
    rng: StdRng,
}

impl UploadRetrier {
    pub fn new(
        uploader: Arc<dyn Uploader>,
        policy: BackoffPolicy,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self {
            uploader,
            policy,
            metrics,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for the jitter (tests).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Blocks until one upload of `payload` succeeds. Returns the retry count.
    pub async fn upload_until_success(&mut self, payload: &[u8]) -> u64 {
        let uploader = &self.uploader;
        retry_until_ok(
            UPLOAD_LABEL,
            &self.policy,
            self.metrics.as_ref(),
            &mut self.rng,
            move || uploader.upload(payload),
        )
        .await
    }
}
