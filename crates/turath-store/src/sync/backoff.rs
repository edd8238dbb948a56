//! Capped exponential backoff with jitter.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms: base_ms.max(1),
            max_ms: max_ms.max(base_ms.max(1)),
        }
    }

    /// Upper bound of the delay after `attempts` failures: `base * 2^(attempts-1)`, capped.
    pub fn ceiling_ms(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(1).min(32);
        self.base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_ms)
    }

    /// Delay drawn uniformly from the upper half of the ceiling.
    pub fn delay_ms<R: Rng + ?Sized>(&self, attempts: u32, rng: &mut R) -> u64 {
        let ceiling = self.ceiling_ms(attempts);
        let floor = ceiling / 2;
        rng.gen_range(floor..=ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ceiling_doubles_then_caps() {
        let backoff = Backoff::new(1_000, 10_000);
        assert_eq!(backoff.ceiling_ms(1), 1_000);
        assert_eq!(backoff.ceiling_ms(2), 2_000);
        assert_eq!(backoff.ceiling_ms(4), 8_000);
        assert_eq!(backoff.ceiling_ms(5), 10_000);
        assert_eq!(backoff.ceiling_ms(200), 10_000);
    }

    #[test]
    fn test_delay_stays_within_bounds() {
        let backoff = Backoff::new(1_000, 60_000);
        let mut rng = StdRng::seed_from_u64(7);
        for attempts in 1..20 {
            let ceiling = backoff.ceiling_ms(attempts);
            let delay = backoff.delay_ms(attempts, &mut rng);
            assert!(delay >= ceiling / 2 && delay <= ceiling);
        }
    }

    #[test]
    fn test_degenerate_configuration() {
        let backoff = Backoff::new(0, 0);
        assert_eq!(backoff.ceiling_ms(3), 1);
    }
}
