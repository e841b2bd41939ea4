//! The `Every` schedule: wall-clock aligned or relative periodic timing
//! with optional jitter.
//!
//! Ported from `shc.timer.Every`. Two firing modes:
//! - aligned: fires on the next multiple of `delta` since the Unix epoch,
//!   so e.g. `delta = 1h` fires on the hour regardless of when the process
//!   started;
//! - unaligned: fires `delta` after the previous firing (or immediately on
//!   the first firing).
//!
//! Both add `offset` and a jitter sample drawn from `random_fn`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Which distribution to draw jitter from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomFn {
    /// Uniform over `[-random, +random]`.
    Uniform,
    /// Gaussian with `random` as one standard deviation, clamped to
    /// `[-3*random, +3*random]` so an unlucky sample can't firing wildly
    /// out of alignment.
    Gauss,
}

/// A periodic schedule: fire every `delta`, optionally epoch-aligned,
/// shifted by `offset`, and jittered.
#[derive(Debug, Clone)]
pub struct Every {
    pub delta: Duration,
    pub align: bool,
    pub offset: Duration,
    pub random: Duration,
    pub random_fn: RandomFn,
}

impl Every {
    pub fn new(delta: Duration) -> Self {
        Every {
            delta,
            align: true,
            offset: Duration::ZERO,
            random: Duration::ZERO,
            random_fn: RandomFn::Uniform,
        }
    }

    #[must_use]
    pub fn aligned(mut self, align: bool) -> Self {
        self.align = align;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, amplitude: Duration, random_fn: RandomFn) -> Self {
        self.random = amplitude;
        self.random_fn = random_fn;
        self
    }

    /// Compute the next firing time given the last one (`None` before the
    /// first firing) and the current wall-clock time.
    pub fn next_execution(&self, last_execution: Option<SystemTime>, now: SystemTime) -> SystemTime {
        let base = if self.align {
            self.next_aligned_boundary(now)
        } else {
            last_execution.map_or(now, |last| last + self.delta)
        };
        apply_seconds(base + self.offset, self.sample_jitter())
    }

    fn next_aligned_boundary(&self, now: SystemTime) -> SystemTime {
        let delta_secs = self.delta.as_secs_f64().max(f64::MIN_POSITIVE);
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs_f64();
        let periods = (since_epoch / delta_secs).floor() + 1.0;
        UNIX_EPOCH + Duration::from_secs_f64(periods * delta_secs)
    }

    fn sample_jitter(&self) -> f64 {
        if self.random.is_zero() {
            return 0.0;
        }
        let amplitude = self.random.as_secs_f64();
        let mut rng = rand::thread_rng();
        match self.random_fn {
            RandomFn::Uniform => rng.gen_range(-amplitude..=amplitude),
            RandomFn::Gauss => {
                let normal = Normal::new(0.0, amplitude).expect("amplitude is finite and positive");
                normal.sample(&mut rng).clamp(-3.0 * amplitude, 3.0 * amplitude)
            }
        }
    }
}

fn apply_seconds(base: SystemTime, seconds: f64) -> SystemTime {
    if seconds >= 0.0 {
        base + Duration::from_secs_f64(seconds)
    } else {
        base.checked_sub(Duration::from_secs_f64(-seconds)).unwrap_or(base)
    }
}

/// Sleep until `target`, halving the remaining wait each iteration once it
/// drops below 0.2s so a suspended/resumed process catches up within one
/// doubling instead of firing one giant `sleep` late.
pub async fn sleep_until_logarithmic(target: SystemTime) {
    loop {
        let now = SystemTime::now();
        let Ok(remaining) = target.duration_since(now) else {
            return;
        };
        if remaining.as_secs_f64() > 0.2 {
            tokio::time::sleep(remaining / 2).await;
        } else {
            tokio::time::sleep(remaining).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_schedule_lands_on_delta_boundary() {
        let every = Every::new(Duration::from_secs(60));
        let now = UNIX_EPOCH + Duration::from_secs(125);
        let next = every.next_execution(None, now);
        assert_eq!(next.duration_since(UNIX_EPOCH).unwrap(), Duration::from_secs(180));
    }

    #[test]
    fn unaligned_schedule_is_relative_to_last_firing() {
        let every = Every::new(Duration::from_secs(10)).aligned(false);
        let last = UNIX_EPOCH + Duration::from_secs(100);
        let next = every.next_execution(Some(last), last + Duration::from_secs(3));
        assert_eq!(next.duration_since(UNIX_EPOCH).unwrap(), Duration::from_secs(110));
    }

    #[test]
    fn unaligned_first_firing_is_immediate() {
        let every = Every::new(Duration::from_secs(10)).aligned(false);
        let now = UNIX_EPOCH + Duration::from_secs(50);
        assert_eq!(every.next_execution(None, now), now);
    }

    #[test]
    fn offset_shifts_the_firing_time() {
        let every = Every::new(Duration::from_secs(60)).with_offset(Duration::from_secs(5));
        let now = UNIX_EPOCH + Duration::from_secs(0);
        let next = every.next_execution(None, now);
        assert_eq!(next.duration_since(UNIX_EPOCH).unwrap(), Duration::from_secs(65));
    }

    #[test]
    fn uniform_jitter_stays_within_amplitude() {
        let every = Every::new(Duration::from_secs(60)).with_jitter(Duration::from_secs(5), RandomFn::Uniform);
        let now = UNIX_EPOCH;
        for _ in 0..200 {
            let next = every.next_execution(None, now);
            let secs = next.duration_since(UNIX_EPOCH).unwrap().as_secs_f64();
            assert!((55.0..=65.0).contains(&secs), "{secs} outside jitter band");
        }
    }
}
