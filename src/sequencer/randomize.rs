// Randomize - Generates a playable groove for all four tracks

use crate::sequencer::STEP_COUNT;
use crate::sequencer::pattern::{BooleanTrack, MelodicTrack};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probabilities used when generating a random pattern
///
/// The anchored hits (kick on every beat, snare on beats 2 and 4) are always
/// placed; the densities below only add extra hits around them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizePolicy {
    /// Chance of an extra kick on an even off-beat step
    pub kick_extra: f64,
    /// Chance of an extra snare on an even step outside the backbeat
    pub snare_extra: f64,
    /// Chance of a hi-hat on any step
    pub hihat: f64,
    /// Chance of a non-rest melody note on any step
    pub melody: f64,
}

impl Default for RandomizePolicy {
    fn default() -> Self {
        Self {
            kick_extra: 0.10,
            snare_extra: 0.05,
            hihat: 0.45,
            melody: 0.35,
        }
    }
}

/// Output of one generation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomPattern {
    pub kick: BooleanTrack,
    pub snare: BooleanTrack,
    pub hihat: BooleanTrack,
    pub melody: MelodicTrack,
}

impl RandomizePolicy {
    /// Names and values of every probability, for validation
    pub fn probabilities(&self) -> [(&'static str, f64); 4] {
        [
            ("kick_extra", self.kick_extra),
            ("snare_extra", self.snare_extra),
            ("hihat", self.hihat),
            ("melody", self.melody),
        ]
    }

    /// Generate all four tracks; `scale_len` includes the rest entry
    pub fn generate<R: Rng + ?Sized>(&self, scale_len: usize, rng: &mut R) -> RandomPattern {
        let mut pattern = RandomPattern {
            kick: [false; STEP_COUNT],
            snare: [false; STEP_COUNT],
            hihat: [false; STEP_COUNT],
            melody: [0; STEP_COUNT],
        };

        for i in 0..STEP_COUNT {
            let even = i % 2 == 0;

            pattern.kick[i] = i % 4 == 0 || (even && chance(rng, self.kick_extra));
            pattern.snare[i] = i % 8 == 4 || (even && chance(rng, self.snare_extra));
            pattern.hihat[i] = chance(rng, self.hihat);

            if scale_len > 1 && chance(rng, self.melody) {
                pattern.melody[i] = rng.gen_range(1..scale_len);
            }
        }

        pattern
    }
}

/// Bernoulli draw that tolerates out-of-range probabilities (NaN never hits)
fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.r#gen::<f64>() < probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_anchored_hits_always_present() {
        let policy = RandomizePolicy::default();
        for seed in 0..50 {
            let pattern = policy.generate(7, &mut StdRng::seed_from_u64(seed));
            for step in [0, 4, 8, 12] {
                assert!(pattern.kick[step], "seed {seed} missing kick at {step}");
            }
            assert!(pattern.snare[4]);
            assert!(pattern.snare[12]);
        }
    }

    #[test]
    fn test_odd_steps_never_get_drums() {
        let policy = RandomizePolicy {
            kick_extra: 1.0,
            snare_extra: 1.0,
            ..Default::default()
        };
        let pattern = policy.generate(7, &mut StdRng::seed_from_u64(9));
        for step in (1..STEP_COUNT).step_by(2) {
            assert!(!pattern.kick[step]);
            assert!(!pattern.snare[step]);
        }
        for step in (0..STEP_COUNT).step_by(2) {
            assert!(pattern.kick[step]);
            assert!(pattern.snare[step]);
        }
    }

    #[test]
    fn test_melody_stays_in_scale() {
        let policy = RandomizePolicy {
            melody: 1.0,
            ..Default::default()
        };
        let pattern = policy.generate(4, &mut StdRng::seed_from_u64(1));
        assert!(pattern.melody.iter().all(|v| (1..4).contains(v)));
    }

    #[test]
    fn test_rest_only_scale_yields_silent_melody() {
        let policy = RandomizePolicy {
            melody: 1.0,
            ..Default::default()
        };
        let pattern = policy.generate(1, &mut StdRng::seed_from_u64(1));
        assert_eq!(pattern.melody, [0; STEP_COUNT]);
    }

    #[test]
    fn test_zero_densities_keep_only_anchors() {
        let policy = RandomizePolicy {
            kick_extra: 0.0,
            snare_extra: 0.0,
            hihat: 0.0,
            melody: f64::NAN,
        };
        let pattern = policy.generate(7, &mut StdRng::seed_from_u64(2));
        assert_eq!(pattern.kick.iter().filter(|x| **x).count(), 4);
        assert_eq!(pattern.snare.iter().filter(|x| **x).count(), 2);
        assert!(pattern.hihat.iter().all(|x| !*x));
        assert!(pattern.melody.iter().all(|x| *x == 0));
    }

    #[test]
    fn test_same_seed_same_pattern() {
        let policy = RandomizePolicy::default();
        let a = policy.generate(7, &mut StdRng::seed_from_u64(42));
        let b = policy.generate(7, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
