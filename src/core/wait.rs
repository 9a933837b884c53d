use crate::domain::ports::Clock;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }
}

/// Sleeps one interval, then evaluates `probe`; repeats until the probe holds
/// or `max_attempts` probes have failed.
pub async fn poll_until<C, F, Fut>(clock: &C, policy: PollPolicy, mut probe: F) -> WaitOutcome
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        clock.sleep(policy.interval).await;
        if probe().await {
            return WaitOutcome::Satisfied { attempts: attempt };
        }
        tracing::debug!("Still waiting... ({}/{})", attempt, policy.max_attempts);
    }
    WaitOutcome::TimedOut {
        attempts: policy.max_attempts,
    }
}
