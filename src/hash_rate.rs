use super::*;

/// Expected hashes behind one difficulty-1 share.
pub const HASHES_PER_DIFFICULTY_1: f64 = 4_294_967_296.0;

/// Share intervals outside this window say nothing useful about the miner.
const SMOOTHING_WINDOW_SECONDS: f64 = 600.0;
const SMOOTHING_RETAIN: f64 = 0.8;
const SMOOTHING_BLEND: f64 = 0.2;
const MIN_INTERVAL_SECONDS: f64 = 0.001;

const SI_PREFIXES: &[(&str, f64)] = &[
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("K", 1e3),
];

/// An exponentially smoothed hashes-per-second estimate. The smoothed value
/// is the only hashrate the pool surfaces.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct HashRate(pub f64);

impl HashRate {
    pub const ZERO: Self = Self(0.0);

    /// The rate a single share implies: `difficulty * 2^32 / interval`.
    pub fn instant(share_difficulty: f64, interval_seconds: f64) -> Self {
        Self(
            share_difficulty * HASHES_PER_DIFFICULTY_1
                / interval_seconds.max(MIN_INTERVAL_SECONDS),
        )
    }

    /// Folds one accepted share into the estimate. Intervals outside
    /// (0, 600) seconds leave it unchanged.
    pub fn smooth(self, share_difficulty: f64, interval_seconds: f64) -> Self {
        if interval_seconds <= 0.0 || interval_seconds >= SMOOTHING_WINDOW_SECONDS {
            return self;
        }

        let instant = Self::instant(share_difficulty, interval_seconds);

        Self(SMOOTHING_RETAIN * self.0 + SMOOTHING_BLEND * instant.0)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl Display for HashRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (prefix, scale) in SI_PREFIXES {
            if self.0 >= *scale {
                return write!(f, "{:.2} {prefix}H/s", self.0 / scale);
            }
        }
        write!(f, "{:.2} H/s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_rate_of_a_difficulty_1_share() {
        assert_eq!(
            HashRate::instant(1.0, 1.0).as_f64(),
            HASHES_PER_DIFFICULTY_1
        );
        assert_eq!(
            HashRate::instant(64.0, 32.0).as_f64(),
            64.0 * HASHES_PER_DIFFICULTY_1 / 32.0
        );
    }

    #[test]
    fn tiny_intervals_are_clamped() {
        assert_eq!(
            HashRate::instant(1.0, 0.0).as_f64(),
            HASHES_PER_DIFFICULTY_1 / MIN_INTERVAL_SECONDS
        );
    }

    #[test]
    fn smoothing_blends_80_20() {
        let smoothed = HashRate(1000.0).smooth(1.0, 1.0);
        assert_eq!(
            smoothed.as_f64(),
            0.8 * 1000.0 + 0.2 * HASHES_PER_DIFFICULTY_1
        );
    }

    #[test]
    fn out_of_window_intervals_are_ignored() {
        let rate = HashRate(1000.0);
        assert_eq!(rate.smooth(1.0, 0.0), rate);
        assert_eq!(rate.smooth(1.0, -5.0), rate);
        assert_eq!(rate.smooth(1.0, 600.0), rate);
        assert_eq!(rate.smooth(1.0, 4000.0), rate);
    }

    #[test]
    fn display_uses_si_prefixes() {
        assert_eq!(HashRate(0.0).to_string(), "0.00 H/s");
        assert_eq!(HashRate(1500.0).to_string(), "1.50 KH/s");
        assert_eq!(HashRate(2.5e9).to_string(), "2.50 GH/s");
        assert_eq!(HashRate(1.2e14).to_string(), "120.00 TH/s");
    }
}
