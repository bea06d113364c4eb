//! Backoff policy: decides how long to wait between retries.

use std::time::Duration;

use rand::Rng;

/// Backoff policy for a fallible remote call.
///
/// The wait starts at `initial` and is multiplied after every failure.
/// Once it would pass `ceiling`, each wait is instead drawn uniformly from
/// `[ceiling, ceiling + jitter)` and it never grows again.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Wait before the first retry.
    pub initial: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Largest un-jittered wait.
    pub ceiling: Duration,

    /// Width of the random window above `ceiling`.
    pub jitter: Duration,
}

impl BackoffPolicy {
    /// 100ms initial wait, doubling, 5 minute ceiling with up to 60s of jitter.
    pub fn default_upload() -> Self {
        Self {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            ceiling: Duration::from_secs(5 * 60),
            jitter: Duration::from_secs(60),
        }
    }

    /// Rejects settings under which the wait would not grow to the ceiling,
    /// or whose arithmetic would overflow.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.initial.is_zero() {
            return Err("initial wait must be greater than zero");
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err("multiplier must be a finite number greater than 1");
        }
        if self.ceiling < self.initial {
            return Err("ceiling must not be shorter than the initial wait");
        }
        if self.ceiling.checked_add(self.jitter).is_none()
            || Duration::try_from_secs_f64(self.ceiling.as_secs_f64() * self.multiplier).is_err()
        {
            return Err("ceiling is too large");
        }
        Ok(())
    }

    /// Draw a wait from `[ceiling, ceiling + jitter)`.
    pub fn jittered_ceiling<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter.is_zero() {
            return self.ceiling;
        }
        rng.gen_range(self.ceiling..self.ceiling + self.jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::default_upload()
    }
}

/// One step of the backoff sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub wait: Duration,
    /// The wait was drawn from the jittered ceiling.
    pub at_ceiling: bool,
}

/// Per-call retry state. Discarded once the call succeeds.
#[derive(Debug, Clone)]
pub struct RetryState {
    wait: Duration,
    capped: bool,
}

impl RetryState {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            wait: policy.initial,
            capped: false,
        }
    }

    /// Wait to sleep after the current failure; advances the state.
    pub fn next_wait<R: Rng + ?Sized>(&mut self, policy: &BackoffPolicy, rng: &mut R) -> Backoff {
        if self.capped || self.wait > policy.ceiling {
            self.capped = true;
            let wait = policy.jittered_ceiling(rng);
            self.wait = wait;
            return Backoff {
                wait,
                at_ceiling: true,
            };
        }

        let wait = self.wait;
        self.wait = wait.mul_f64(policy.multiplier);
        Backoff {
            wait,
            at_ceiling: false,
        }
    }
}
