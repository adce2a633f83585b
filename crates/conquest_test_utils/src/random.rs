//! Scripted randomness for forcing specific branches.

use std::collections::VecDeque;

use conquest_core::random::RandomSource;

/// A [`RandomSource`] that replays queued answers.
///
/// When a queue runs dry, `chance` answers `false` and `pick` answers `0`,
/// so an empty script means "never block, never err, always the first
/// candidate".
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    chances: VecDeque<bool>,
    picks: VecDeque<usize>,
    /// Probabilities passed to `chance`, in call order.
    pub chance_calls: Vec<f64>,
    /// Lengths passed to `pick`, in call order.
    pub pick_calls: Vec<usize>,
}

impl ScriptedRandom {
    /// Empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for `chance`.
    #[must_use]
    pub fn with_chances(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.chances.extend(answers);
        self
    }

    /// Queue answers for `pick`.
    #[must_use]
    pub fn with_picks(mut self, answers: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(answers);
        self
    }

    /// Whether every queued answer has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.chances.is_empty() && self.picks.is_empty()
    }
}

impl RandomSource for ScriptedRandom {
    fn chance(&mut self, p: f64) -> bool {
        self.chance_calls.push(p);
        self.chances.pop_front().unwrap_or(false)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.pick_calls.push(len);
        let answer = self.picks.pop_front().unwrap_or(0);
        answer.min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_then_defaults() {
        let mut rng = ScriptedRandom::new()
            .with_chances([true, false, true])
            .with_picks([2]);
        assert!(rng.chance(0.5));
        assert!(!rng.chance(0.5));
        assert!(rng.chance(0.5));
        assert!(!rng.chance(0.5));
        assert_eq!(rng.pick(5), 2);
        assert_eq!(rng.pick(5), 0);
        assert!(rng.is_exhausted());
        assert_eq!(rng.pick_calls, vec![5, 5]);
    }

    #[test]
    fn picks_are_clamped_to_length() {
        let mut rng = ScriptedRandom::new().with_picks([9]);
        assert_eq!(rng.pick(3), 2);
    }
}
