use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the two delays in a run: the gap between car arrivals and the
/// time a pump spends on one car.
pub trait Pacing: Send + Sync {
    fn arrival_gap(&self) -> Duration;
    fn service_time(&self) -> Duration;
}

/// Uniformly random delays: arrivals `[0, 800) ms` apart, services lasting
/// `[1000, 3000) ms`, both divided by `speed`.
pub struct RandomPacing {
    rng: Mutex<StdRng>,
    speed: f64,
}

impl RandomPacing {
    const ARRIVAL_MS: std::ops::Range<u64> = 0..800;
    const SERVICE_MS: std::ops::Range<u64> = 1000..3000;

    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            speed: 1.0,
        }
    }

    /// Slowest and fastest accepted speed-up factors.
    pub const SPEED_LIMITS: (f64, f64) = (0.01, 1000.0);

    /// Scales both delays down by `speed`, clamped to [`Self::SPEED_LIMITS`].
    /// Non-positive and non-finite values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            let (min, max) = Self::SPEED_LIMITS;
            self.speed = speed.clamp(min, max);
        }
        self
    }

    fn sample(&self, range: std::ops::Range<u64>) -> Duration {
        let ms = self.rng.lock().gen_range(range);
        Duration::from_millis(ms).div_f64(self.speed)
    }
}

impl Default for RandomPacing {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacing for RandomPacing {
    fn arrival_gap(&self) -> Duration {
        self.sample(Self::ARRIVAL_MS)
    }

    fn service_time(&self) -> Duration {
        self.sample(Self::SERVICE_MS)
    }
}

/// Constant delays, mostly for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPacing {
    pub arrival: Duration,
    pub service: Duration,
}

impl FixedPacing {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn new(arrival: Duration, service: Duration) -> Self {
        Self { arrival, service }
    }
}

impl Pacing for FixedPacing {
    fn arrival_gap(&self) -> Duration {
        self.arrival
    }

    fn service_time(&self) -> Duration {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delays_stay_in_range() {
        let pacing = RandomPacing::seeded(7);
        for _ in 0..200 {
            assert!(pacing.arrival_gap() < Duration::from_millis(800));
            let service = pacing.service_time();
            assert!(service >= Duration::from_millis(1000));
            assert!(service < Duration::from_millis(3000));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = RandomPacing::seeded(42);
        let b = RandomPacing::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.service_time(), b.service_time());
        }
    }

    #[test]
    fn speed_divides_delays() {
        let pacing = RandomPacing::seeded(1).with_speed(10.0);
        let service = pacing.service_time();
        assert!(service >= Duration::from_millis(99));
        assert!(service <= Duration::from_millis(300));
    }

    #[test]
    fn extreme_speeds_are_clamped() {
        let slow = RandomPacing::seeded(1).with_speed(1e-20);
        assert!(slow.service_time() < Duration::from_secs(300));
        let fast = RandomPacing::seeded(1).with_speed(f64::MAX);
        assert!(fast.service_time() <= Duration::from_millis(3));
        let ignored = RandomPacing::seeded(1).with_speed(f64::NAN);
        assert!(ignored.service_time() >= Duration::from_millis(1000));
    }
}
