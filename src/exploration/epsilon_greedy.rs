use rand::Rng;

use crate::{
    decay::{self, Decay},
    error::Result,
    util::check_interval,
};

use super::Choice;

/// Epsilon greedy exploration policy with time-decaying epsilon threshold
///
/// The policy holds no step counter of its own. Callers pass the number of steps taken so far
/// into [`choose`](EpsilonGreedy::choose) and keep the incremented count it returns.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<D: Decay> {
    epsilon: D,
}

impl<D: Decay> EpsilonGreedy<D> {
    /// Initialize epsilon greedy policy with a decay strategy
    pub fn new(decay: D) -> Self {
        Self { epsilon: decay }
    }

    /// The exploration probability after `steps_done` action selections
    pub fn epsilon(&self, steps_done: u64) -> f32 {
        self.epsilon.evaluate(steps_done as f32)
    }

    /// Invoke epsilon greedy policy
    ///
    /// **Returns** `(choice, steps_done + 1)`
    pub fn choose(&self, steps_done: u64, rng: &mut impl Rng) -> (Choice, u64) {
        let epsilon = self.epsilon(steps_done);
        let choice = if rng.gen::<f32>() > epsilon {
            Choice::Exploit
        } else {
            Choice::Explore
        };
        (choice, steps_done + 1)
    }
}

impl EpsilonGreedy<decay::Exponential> {
    /// The classic schedule ε = end + (start - end) * e<sup>-steps / decay</sup>
    pub fn exponential(start: f32, end: f32, decay: f32) -> Result<Self> {
        check_interval("eps_start", start.into(), 0.0, 1.0)?;
        check_interval("eps_end", end.into(), 0.0, 1.0)?;
        Ok(Self::new(decay::Exponential::from_time_constant(
            start, end, decay,
        )?))
    }
}
