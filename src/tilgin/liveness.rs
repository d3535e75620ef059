//! Wait for the router to go down and come back after a restart

use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use super::client::ReachabilityProbe;
use crate::error::AppError;

/// Timings for the liveness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Time between two probes
    pub poll_interval: Duration,
    /// Per-request timeout of a probe
    pub probe_timeout: Duration,
    /// Overall wait before giving up
    pub deadline: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(5 * 60),
        }
    }
}

/// Tracks reachability samples and reports the down→up transition.
///
/// A router that stays reachable has not restarted yet, so only a
/// reachable sample following an unreachable one counts.
#[derive(Debug, Default)]
pub struct DowntimeTracker {
    first_seen_down: Option<Instant>,
}

impl DowntimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. Returns the downtime once the router is back up.
    pub fn observe(&mut self, reachable: bool, now: Instant) -> Option<Duration> {
        match (reachable, self.first_seen_down) {
            (false, None) => {
                self.first_seen_down = Some(now);
                None
            }
            (false, Some(_)) | (true, None) => None,
            (true, Some(down_since)) => Some(now.saturating_duration_since(down_since)),
        }
    }

    pub fn seen_down(&self) -> bool {
        self.first_seen_down.is_some()
    }
}

/// Probe once per tick until the router has been seen down and then up again.
///
/// Returns the observed downtime, or `LivenessTimeoutError` when the deadline
/// fires first.
pub async fn await_liveness<P>(probe: &P, policy: &LivenessPolicy) -> Result<Duration, AppError>
where
    P: ReachabilityProbe + ?Sized,
{
    let deadline = sleep(policy.deadline);
    tokio::pin!(deadline);

    let mut ticker = interval_at(Instant::now() + policy.poll_interval, policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut tracker = DowntimeTracker::new();

    loop {
        tokio::select! {
            _ = &mut deadline => {
                tracing::warn!(
                    seen_down = tracker.seen_down(),
                    "[Tilgin] Timed out waiting for router to come back up"
                );
                return Err(AppError::LivenessTimeoutError(policy.deadline));
            }
            _ = ticker.tick() => {
                let result = probe.probe().await;
                let reachable = result.is_ok();

                if let Some(downtime) = tracker.observe(reachable, Instant::now()) {
                    tracing::info!(downtime = ?downtime, "[Tilgin] Router has come back up");
                    return Ok(downtime);
                }

                match result {
                    Ok(()) => tracing::info!("[Tilgin] Router is reachable"),
                    Err(e) => tracing::info!(error = %e, "[Tilgin] Failed to reach router host"),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Replays a fixed reachability sequence, then repeats the last sample
    pub(crate) struct ScriptedProbe {
        samples: Mutex<VecDeque<bool>>,
        last: Mutex<bool>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        pub(crate) fn new(samples: &[bool]) -> Self {
            Self {
                samples: Mutex::new(samples.iter().copied().collect()),
                last: Mutex::new(true),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReachabilityProbe for ScriptedProbe {
        async fn probe(&self) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut last = self.last.lock().unwrap();
            if let Some(sample) = self.samples.lock().unwrap().pop_front() {
                *last = sample;
            }
            if *last {
                Ok(())
            } else {
                Err("connection_failed".to_string())
            }
        }
    }

    fn policy(deadline_secs: u64) -> LivenessPolicy {
        LivenessPolicy {
            poll_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(deadline_secs),
        }
    }

    #[test]
    fn test_tracker_requires_down_before_up() {
        let start = Instant::now();
        let mut tracker = DowntimeTracker::new();
        assert_eq!(tracker.observe(true, start), None);
        assert_eq!(tracker.observe(true, start + Duration::from_secs(1)), None);
        assert_eq!(tracker.observe(false, start + Duration::from_secs(2)), None);
        assert_eq!(tracker.observe(false, start + Duration::from_secs(3)), None);
        assert_eq!(
            tracker.observe(true, start + Duration::from_secs(4)),
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_up_after_down() {
        let probe = ScriptedProbe::new(&[true, true, false, false, true]);
        let started = Instant::now();

        let downtime = await_liveness(&probe, &policy(300)).await.unwrap();

        assert_eq!(probe.calls(), 5);
        assert_eq!(downtime, Duration::from_secs(2));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    /// Answers after a per-call delay
    struct SlowRouter {
        script: Mutex<VecDeque<(bool, Duration)>>,
    }

    #[async_trait]
    impl ReachabilityProbe for SlowRouter {
        async fn probe(&self) -> Result<(), String> {
            let next = self.script.lock().unwrap().pop_front();
            let (reachable, delay) = next.unwrap_or((true, Duration::ZERO));
            sleep(delay).await;
            if reachable {
                Ok(())
            } else {
                Err("timeout".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_keeps_ticks_on_interval_grid() {
        // 1.0s: up after 1.5s; 2.5s: late tick, down; 3.0s: next grid tick, up
        let router = SlowRouter {
            script: Mutex::new(VecDeque::from([
                (true, Duration::from_millis(1500)),
                (false, Duration::ZERO),
                (true, Duration::ZERO),
            ])),
        };
        let started = Instant::now();

        let downtime = await_liveness(&router, &policy(300)).await.unwrap();

        assert_eq!(downtime, Duration::from_millis(500));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_up_times_out() {
        let probe = ScriptedProbe::new(&[true]);

        let err = await_liveness(&probe, &policy(10)).await.unwrap_err();

        assert!(matches!(err, AppError::LivenessTimeoutError(d) if d == Duration::from_secs(10)));
        assert!(probe.calls() >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_back_up_times_out() {
        let probe = ScriptedProbe::new(&[true, false]);

        let err = await_liveness(&probe, &policy(30)).await.unwrap_err();

        assert!(matches!(err, AppError::LivenessTimeoutError(_)));
    }
}
