//! Bounded random jitter for synthetic input.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const MIN_JITTER: i32 = -2;
pub const MAX_JITTER: i32 = 2;
pub const MIN_DELAY_MS: u64 = 8;
pub const MAX_DELAY_MS: u64 = 24;

/// Inclusive bounds for pointer offsets (pixels) and inter-step delays (ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterConfig {
    pub offset_min: i32,
    pub offset_max: i32,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            offset_min: MIN_JITTER,
            offset_max: MAX_JITTER,
            delay_min_ms: MIN_DELAY_MS,
            delay_max_ms: MAX_DELAY_MS,
        }
    }
}

impl JitterConfig {
    /// Bounds given in either order are normalised to `min <= max`.
    pub fn new(offset_a: i32, offset_b: i32, delay_a_ms: u64, delay_b_ms: u64) -> Self {
        Self {
            offset_min: offset_a.min(offset_b),
            offset_max: offset_a.max(offset_b),
            delay_min_ms: delay_a_ms.min(delay_b_ms),
            delay_max_ms: delay_a_ms.max(delay_b_ms),
        }
    }

    /// No offsets and no delays.
    pub fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

pub struct Humanizer {
    config: JitterConfig,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Humanizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Humanizer")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new(JitterConfig::default())
    }
}

impl Humanizer {
    pub fn new(config: JitterConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence, for tests and replay.
    pub fn seeded(config: JitterConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn config(&self) -> JitterConfig {
        self.config
    }

    /// Uniform integer in `[offset_min, offset_max]`.
    pub fn offset(&self) -> i32 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(self.config.offset_min..=self.config.offset_max)
    }

    /// Independent offsets applied to each axis.
    pub fn jitter_point(&self, x: i32, y: i32) -> (i32, i32) {
        (x.saturating_add(self.offset()), y.saturating_add(self.offset()))
    }

    /// Uniform duration in `[delay_min_ms, delay_max_ms]`.
    pub fn delay(&self) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.gen_range(self.config.delay_min_ms..=self.config.delay_max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_and_delays_stay_within_bounds() {
        let humanizer = Humanizer::default();
        for _ in 0..5_000 {
            let offset = humanizer.offset();
            assert!((MIN_JITTER..=MAX_JITTER).contains(&offset), "offset {offset}");
            let delay = humanizer.delay().as_millis() as u64;
            assert!((MIN_DELAY_MS..=MAX_DELAY_MS).contains(&delay), "delay {delay}");
        }
    }

    #[test]
    fn both_ends_of_the_range_are_reachable() {
        let humanizer = Humanizer::seeded(JitterConfig::default(), 7);
        let samples: Vec<i32> = (0..2_000).map(|_| humanizer.offset()).collect();
        assert!(samples.contains(&MIN_JITTER));
        assert!(samples.contains(&MAX_JITTER));
    }

    #[test]
    fn reversed_bounds_are_normalised() {
        let config = JitterConfig::new(5, -5, 30, 10);
        assert_eq!(config.offset_min, -5);
        assert_eq!(config.delay_max_ms, 30);
        let humanizer = Humanizer::seeded(config, 1);
        for _ in 0..200 {
            assert!((-5..=5).contains(&humanizer.offset()));
        }
    }

    #[test]
    fn zero_config_is_a_no_op() {
        let humanizer = Humanizer::seeded(JitterConfig::none(), 3);
        assert_eq!(humanizer.jitter_point(40, 50), (40, 50));
        assert_eq!(humanizer.delay(), Duration::ZERO);
    }
}
