//! Eventual-consistency poller
//!
//! The remote API can report an object as deleted and then briefly report it
//! as present again. A single "gone" observation is therefore not trusted:
//! the probe must return the target state for `stable_count` consecutive
//! polls, and any other observation resets the count.

use crate::policy::StabilityConfig;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

/// Whether a remote object is currently observable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Exists,
    NotFound,
}

/// Counters collected while polling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Probe invocations
    pub polls: u32,
    /// Times a non-target observation broke a running streak
    pub resets: u32,
}

/// Result of [`poll_until_stable`]
#[derive(Debug)]
pub enum PollOutcome<E> {
    Reached(PollStats),
    TimedOut(PollStats),
    Interrupted(PollStats),
    /// The probe itself failed (transport or auth), not "not found"
    Failed(E),
}

impl<E> PollOutcome<E> {
    pub fn stats(&self) -> Option<PollStats> {
        match self {
            PollOutcome::Reached(s) | PollOutcome::TimedOut(s) | PollOutcome::Interrupted(s) => {
                Some(*s)
            }
            PollOutcome::Failed(_) => None,
        }
    }
}

/// Invoke `probe` on a fixed interval until it returns `target`
/// `config.stable_count` times in a row, or `timeout` elapses
///
/// A probe still in flight at the deadline is abandoned.
pub async fn poll_until_stable<S, E, F, Fut>(
    mut probe: F,
    target: &S,
    config: &StabilityConfig,
    timeout: Duration,
    cancel: &CancellationToken,
) -> PollOutcome<E>
where
    S: PartialEq + Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
{
    let deadline = Instant::now() + timeout;
    let required = config.stable_count.max(1);
    let mut stats = PollStats::default();
    let mut consecutive = 0u32;

    loop {
        let observed = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Interrupted(stats),
            _ = sleep_until(deadline) => return PollOutcome::TimedOut(stats),
            observed = probe() => observed,
        };
        stats.polls = stats.polls.saturating_add(1);

        match observed {
            Ok(state) if state == *target => {
                consecutive += 1;
                if consecutive >= required {
                    tracing::debug!(
                        polls = stats.polls,
                        resets = stats.resets,
                        "observed {:?} {} times in a row",
                        target,
                        consecutive
                    );
                    return PollOutcome::Reached(stats);
                }
            }
            Ok(state) => {
                if consecutive > 0 {
                    stats.resets += 1;
                    tracing::debug!(
                        "observed {:?} after {} consecutive {:?}, starting over",
                        state,
                        consecutive,
                        target
                    );
                }
                consecutive = 0;
            }
            Err(e) => return PollOutcome::Failed(e),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return PollOutcome::TimedOut(stats);
        }

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Interrupted(stats),
            _ = sleep(config.poll_interval.min(remaining)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn config(stable_count: u32) -> StabilityConfig {
        StabilityConfig {
            stable_count,
            poll_interval: Duration::from_secs(10),
        }
    }

    async fn run(
        sequence: Vec<Presence>,
        stable_count: u32,
        timeout: Duration,
    ) -> PollOutcome<String> {
        let mut queue: VecDeque<Presence> = sequence.into();
        poll_until_stable(
            move || {
                let next = queue.pop_front().unwrap_or(Presence::Exists);
                async move { Ok::<_, String>(next) }
            },
            &Presence::NotFound,
            &config(stable_count),
            timeout,
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_flicker_resets_the_count() {
        use Presence::*;
        let outcome = run(
            vec![NotFound, Exists, NotFound, NotFound, NotFound, NotFound, NotFound],
            5,
            Duration::from_secs(600),
        )
        .await;

        match outcome {
            PollOutcome::Reached(stats) => {
                // only the trailing five NotFound count
                assert_eq!(stats.polls, 7);
                assert_eq!(stats.resets, 1);
            }
            other => panic!("expected Reached, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_from_the_start() {
        let outcome = run(vec![Presence::NotFound; 5], 5, Duration::from_secs(600)).await;
        assert_eq!(
            outcome.stats(),
            Some(PollStats {
                polls: 5,
                resets: 0
            })
        );
        assert!(matches!(outcome, PollOutcome::Reached(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_stable() {
        let started = Instant::now();
        let outcome = run(vec![], 5, Duration::from_secs(60)).await;
        assert!(matches!(outcome, PollOutcome::TimedOut(_)));
        assert!(started.elapsed() <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_bounded_by_the_timeout() {
        let started = Instant::now();
        let outcome = poll_until_stable(
            std::future::pending::<Result<Presence, String>>,
            &Presence::NotFound,
            &config(5),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, PollOutcome::TimedOut(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_is_failure() {
        let outcome = poll_until_stable(
            || async { Err::<Presence, _>("connection reset".to_string()) },
            &Presence::NotFound,
            &config(5),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, PollOutcome::Failed(ref e) if e == "connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = poll_until_stable(
            || async { Ok::<_, String>(Presence::Exists) },
            &Presence::NotFound,
            &config(5),
            Duration::from_secs(60),
            &cancel,
        )
        .await;
        assert!(matches!(outcome, PollOutcome::Interrupted(_)));
    }
}
