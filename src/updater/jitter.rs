//! Jittered periodic scheduling
//!
//! Several controller replicas started together would otherwise hit the API
//! server in lockstep. Every wait is stretched by a random amount of up to
//! `factor * period`.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Default jitter factor
pub const DEFAULT_JITTER_FACTOR: f64 = 1.2;

/// Stretch `duration` by a random amount in `[0, max_factor * duration)`
///
/// A non-positive or non-finite factor is treated as 1.0. The result
/// saturates at `Duration::MAX`.
pub fn jittered(duration: Duration, max_factor: f64) -> Duration {
    let extra = rand::thread_rng().gen::<f64>() * effective_factor(max_factor);
    duration.saturating_add(scale(duration, extra))
}

fn effective_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    }
}

fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Deadline `delay` from now, capped far in the future instead of overflowing
pub(crate) fn deadline_after(delay: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

// Same horizon tokio uses for an unbounded sleep
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Period plus jitter factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterSchedule {
    pub period: Duration,
    pub factor: f64,
}

impl JitterSchedule {
    pub fn new(period: Duration, factor: f64) -> Self {
        Self { period, factor }
    }

    /// Delay until the next run
    pub fn next_delay(&self) -> Duration {
        jittered(self.period, self.factor)
    }

    /// Upper bound of [`next_delay`](Self::next_delay)
    pub fn max_delay(&self) -> Duration {
        self.period
            .saturating_add(scale(self.period, effective_factor(self.factor)))
    }
}

/// Run `f` immediately and then after every jittered period until `stop` resolves
///
/// The delay is measured from the end of each run, so runs never overlap.
/// `stop` is only observed between runs: a run in progress always completes,
/// and no run starts once `stop` has resolved.
pub async fn jitter_until<S, F, Fut>(schedule: JitterSchedule, stop: S, mut f: F)
where
    S: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = std::future::ready(()) => {}
        }

        f().await;

        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = tokio::time::sleep_until(deadline_after(schedule.next_delay())) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_jittered_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..200 {
            let d = jittered(base, DEFAULT_JITTER_FACTOR);
            assert!(d >= base);
            assert!(d < Duration::from_secs(22));
        }
    }

    #[test]
    fn test_non_positive_factor_falls_back() {
        let schedule = JitterSchedule::new(Duration::from_secs(4), 0.0);
        assert_eq!(schedule.max_delay(), Duration::from_secs(8));
        for _ in 0..50 {
            assert!(schedule.next_delay() < Duration::from_secs(8));
        }
    }

    #[test]
    fn test_huge_period_saturates() {
        let huge = Duration::from_secs(u64::MAX);
        assert!(jittered(huge, DEFAULT_JITTER_FACTOR) >= huge);
        assert_eq!(JitterSchedule::new(huge, 1.2).max_delay(), Duration::MAX);
    }

    #[test]
    fn test_non_finite_factor_falls_back() {
        let base = Duration::from_secs(4);
        for factor in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let schedule = JitterSchedule::new(base, factor);
            assert_eq!(schedule.max_delay(), Duration::from_secs(8));
            let d = schedule.next_delay();
            assert!(d >= base && d < Duration::from_secs(8));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_never_overflows() {
        let now = tokio::time::Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > now + Duration::from_secs(86400 * 365));
        assert_eq!(
            deadline_after(Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_immediate() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let started = tokio::time::Instant::now();

        let handle = tokio::spawn(jitter_until(
            JitterSchedule::new(Duration::from_secs(60), DEFAULT_JITTER_FACTOR),
            async {
                let _ = rx.await;
            },
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
        ));

        while runs.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_within_max_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let schedule = JitterSchedule::new(Duration::from_secs(10), DEFAULT_JITTER_FACTOR);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(jitter_until(
            schedule,
            async {
                let _ = rx.await;
            },
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
        ));

        // Three full max delays guarantee at least three more runs
        tokio::time::sleep(schedule.max_delay() * 3).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        let count = runs.load(Ordering::SeqCst);
        assert!(count >= 4, "expected at least 4 runs, got {}", count);
        // Never faster than the nominal period
        assert!(count <= 1 + 3 * 22 / 10);
    }

    #[tokio::test]
    async fn test_stopped_before_start_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        jitter_until(
            JitterSchedule::new(Duration::from_secs(1), 1.0),
            async {},
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            },
        )
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
