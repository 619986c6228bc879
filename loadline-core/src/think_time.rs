//! Randomized pauses between steps

use loadline_config::ThinkTimeConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::control::RunControl;

/// Uniform pause in `[min, max]`, or nothing when disabled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThinkTime {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            enabled: true,
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ThinkTimeConfig) -> Self {
        if config.enabled {
            Self::new(config.min, config.max)
        } else {
            Self::disabled()
        }
    }

    /// Draw a pause length; `None` when think time is off
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let spread = self.max.saturating_sub(self.min).as_secs_f64();
        Some(self.min + Duration::from_secs_f64(spread * rng.random::<f64>()))
    }

    /// Sleep for a sampled pause unless the run stops first.
    /// Returns false when the pause was cut short by a stop.
    pub async fn pause<R: Rng + ?Sized>(&self, rng: &mut R, control: &RunControl) -> bool {
        let Some(pause) = self.sample(rng) else {
            return !control.is_stopping();
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => !control.is_stopping(),
            _ = control.cancelled() => false,
        }
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self::from_config(&ThinkTimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::StopReason;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_samples_stay_in_range() {
        let think = ThinkTime::new(Duration::from_millis(500), Duration::from_secs(2));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let pause = think.sample(&mut rng).unwrap();
            assert!(pause >= Duration::from_millis(500) && pause <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_disabled_never_pauses() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(ThinkTime::disabled().sample(&mut rng), None);

        let config = ThinkTimeConfig {
            enabled: false,
            ..ThinkTimeConfig::default()
        };
        assert!(!ThinkTime::from_config(&config).enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps() {
        let think = ThinkTime::new(Duration::from_secs(1), Duration::from_secs(1));
        let control = RunControl::new();
        let mut rng = StdRng::seed_from_u64(1);

        let started = tokio::time::Instant::now();
        assert!(think.pause(&mut rng, &control).await);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_cut_short_by_stop() {
        let think = ThinkTime::new(Duration::from_secs(10), Duration::from_secs(10));
        let control = RunControl::new();
        let stopper = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            stopper.stop(StopReason::Interrupted);
        });

        let mut rng = StdRng::seed_from_u64(1);
        let started = tokio::time::Instant::now();
        assert!(!think.pause(&mut rng, &control).await);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
