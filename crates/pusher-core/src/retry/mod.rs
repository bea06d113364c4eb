//! Retry module: exponential backoff with a jittered ceiling.
//!
//! There is no attempt limit and no cancellation. A call that never succeeds
//! blocks its caller until the process exits.

mod policy;
mod uploader;

pub use policy::{Backoff, BackoffPolicy, RetryState};
pub use uploader::UploadRetrier;

use std::fmt::Display;
use std::future::Future;

use rand::Rng;
use tracing::warn;

use crate::ports::Metrics;

/// Call `op` until it returns `Ok`, sleeping between attempts.
///
/// Returns the number of retries that were needed.
pub async fn retry_until_ok<F, Fut, E, R>(
    label: &str,
    policy: &BackoffPolicy,
    metrics: &dyn Metrics,
    rng: &mut R,
    mut op: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
    R: Rng + ?Sized,
{
    let mut state = RetryState::new(policy);
    let mut retries = 0;
    loop {
        let err = match op().await {
            Ok(()) => return retries,
            Err(err) => err,
        };

        let step = state.next_wait(policy, rng);
        if step.at_ceiling {
            metrics.max_backoff_reached(label);
            warn!(label, "maximum retry backoff has been reached");
        }
        warn!(
            label,
            error = %err,
            wait = ?step.wait,
            "call failed, will retry"
        );
        metrics.call_retried(label);
        retries += 1;
        tokio::time::sleep(step.wait).await;
    }
}
