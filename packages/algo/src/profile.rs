//! Personality and learning-style readouts.
//!
//! Two generators share the same output ranges:
//! - random: independent draws per trait and a uniform style pick, ignoring the answers;
//! - derived: pure functions of the answer tally.

use rand::Rng;

use crate::sanitize::lerp_u8;
use crate::types::{
    LearningStyle, PersonalityProfile, TraitRange, ANALYTICAL_RANGE, CREATIVE_RANGE,
    LEADERSHIP_RANGE, MAX_ANSWER_VALUE, MIN_ANSWER_VALUE, PRACTICAL_RANGE, SOCIAL_RANGE,
};

/// Aggregate view of the normalised answers of one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerTally {
    counts: [u32; 5],
    total: u32,
    sum: u32,
}

impl AnswerTally {
    pub fn from_values(values: &[u8]) -> Self {
        let mut tally = Self::default();
        for &value in values {
            let value = value.clamp(MIN_ANSWER_VALUE, MAX_ANSWER_VALUE);
            tally.counts[(value - 1) as usize] += 1;
            tally.total += 1;
            tally.sum += value as u32;
        }
        tally
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn sum(&self) -> u32 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count_of(&self, value: u8) -> u32 {
        match value {
            1..=5 => self.counts[(value - 1) as usize],
            _ => 0,
        }
    }

    /// Sum as a fraction of the maximum possible sum; 0 for an empty tally.
    pub fn fill_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.sum as f64 / (self.total as f64 * MAX_ANSWER_VALUE as f64)
    }

    /// Mean mapped onto [0, 1] where 1 is "all fives".
    pub fn mean_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let mean = self.sum as f64 / self.total as f64;
        (mean - MIN_ANSWER_VALUE as f64) / (MAX_ANSWER_VALUE - MIN_ANSWER_VALUE) as f64
    }

    fn share(&self, count: u32) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }

    pub fn high_share(&self) -> f64 {
        self.share(self.count_of(4) + self.count_of(5))
    }

    pub fn neutral_share(&self) -> f64 {
        self.share(self.count_of(3))
    }

    pub fn low_share(&self) -> f64 {
        self.share(self.count_of(1) + self.count_of(2))
    }

    /// Distance between the lowest and highest answer used, on [0, 1].
    pub fn spread(&self) -> f64 {
        let lowest = (1..=5u8).find(|v| self.count_of(*v) > 0);
        let highest = (1..=5u8).rev().find(|v| self.count_of(*v) > 0);
        match (lowest, highest) {
            (Some(lo), Some(hi)) => (hi - lo) as f64 / (MAX_ANSWER_VALUE - MIN_ANSWER_VALUE) as f64,
            _ => 0.0,
        }
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, range: TraitRange) -> u8 {
    rng.gen_range(range.low..range.high)
}

fn scale(range: TraitRange, t: f64) -> u8 {
    lerp_u8(range.low, range.high - 1, t)
}

pub fn random_personality<R: Rng + ?Sized>(rng: &mut R) -> PersonalityProfile {
    PersonalityProfile {
        analytical: draw(rng, ANALYTICAL_RANGE),
        creative: draw(rng, CREATIVE_RANGE),
        social: draw(rng, SOCIAL_RANGE),
        practical: draw(rng, PRACTICAL_RANGE),
        leadership: draw(rng, LEADERSHIP_RANGE),
    }
}

pub fn random_learning_style<R: Rng + ?Sized>(rng: &mut R) -> LearningStyle {
    LearningStyle::ALL[rng.gen_range(0..LearningStyle::ALL.len())]
}

pub fn derived_personality(tally: &AnswerTally) -> PersonalityProfile {
    let high = tally.high_share();
    let low = tally.low_share();
    let spread = tally.spread();

    PersonalityProfile {
        analytical: scale(ANALYTICAL_RANGE, tally.mean_ratio()),
        creative: scale(CREATIVE_RANGE, spread),
        social: scale(SOCIAL_RANGE, high),
        practical: scale(PRACTICAL_RANGE, 1.0 - spread),
        leadership: scale(LEADERSHIP_RANGE, (high - low + 1.0) / 2.0),
    }
}

/// Wide-ranging answers read as hands-on; otherwise the dominant answer band decides.
pub fn derived_learning_style(tally: &AnswerTally) -> LearningStyle {
    if tally.spread() >= 0.75 {
        return LearningStyle::Kinesthetic;
    }

    let bands = [
        (tally.high_share(), LearningStyle::Visual),
        (tally.neutral_share(), LearningStyle::ReadingWriting),
        (tally.low_share(), LearningStyle::Auditory),
    ];

    let mut best = bands[0];
    for band in &bands[1..] {
        if band.0 > best.0 {
            best = *band;
        }
    }
    best.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tally_counts() {
        let tally = AnswerTally::from_values(&[5, 5, 3, 1]);
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.sum(), 14);
        assert_eq!(tally.count_of(5), 2);
        assert!((tally.fill_ratio() - 0.7).abs() < 1e-9);
        assert!((tally.high_share() - 0.5).abs() < 1e-9);
        assert!((tally.spread() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_tally_is_neutral() {
        let tally = AnswerTally::from_values(&[]);
        assert!(tally.is_empty());
        assert_eq!(tally.fill_ratio(), 0.0);
        assert_eq!(tally.spread(), 0.0);
    }

    #[test]
    fn test_random_personality_within_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let p = random_personality(&mut rng);
            assert!(ANALYTICAL_RANGE.contains(p.analytical));
            assert!(CREATIVE_RANGE.contains(p.creative));
            assert!(SOCIAL_RANGE.contains(p.social));
            assert!(PRACTICAL_RANGE.contains(p.practical));
            assert!(LEADERSHIP_RANGE.contains(p.leadership));
        }
    }

    #[test]
    fn test_random_style_covers_all_tags() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(random_learning_style(&mut rng));
        }
        assert_eq!(seen.len(), LearningStyle::ALL.len());
    }

    #[test]
    fn test_derived_personality_tracks_answers() {
        let keen = derived_personality(&AnswerTally::from_values(&[5, 5, 5, 5]));
        let cool = derived_personality(&AnswerTally::from_values(&[1, 1, 2, 1]));

        assert_eq!(keen.analytical, 99);
        assert!(keen.social > cool.social);
        assert!(keen.leadership > cool.leadership);
        assert!(ANALYTICAL_RANGE.contains(cool.analytical));
        assert!(PRACTICAL_RANGE.contains(keen.practical));
    }

    #[test]
    fn test_derived_learning_style() {
        assert_eq!(
            derived_learning_style(&AnswerTally::from_values(&[1, 5, 3])),
            LearningStyle::Kinesthetic
        );
        assert_eq!(
            derived_learning_style(&AnswerTally::from_values(&[4, 5, 4])),
            LearningStyle::Visual
        );
        assert_eq!(
            derived_learning_style(&AnswerTally::from_values(&[3, 3, 2])),
            LearningStyle::ReadingWriting
        );
        assert_eq!(
            derived_learning_style(&AnswerTally::from_values(&[2, 1, 2])),
            LearningStyle::Auditory
        );
    }
}
