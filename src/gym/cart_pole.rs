use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rand_distr::{Distribution, Uniform};
use strum::{EnumIter, FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Feedback};

const GRAVITY: f32 = 9.8;
const MASS_CART: f32 = 1.0;
const MASS_POLE: f32 = 0.1;
const TOTAL_MASS: f32 = MASS_CART + MASS_POLE;
/// Half the pole's length
const LENGTH: f32 = 0.5;
const POLE_MASS_LENGTH: f32 = MASS_POLE * LENGTH;
const FORCE_MAG: f32 = 10.0;
/// Seconds between state updates
const TAU: f32 = 0.02;
const THETA_THRESHOLD: f32 = 12.0 * 2.0 * std::f32::consts::PI / 360.0;
const X_THRESHOLD: f32 = 2.4;

/// Actions for the [`CartPole`] environment, representing applying a left or right force to the cart
#[derive(FromRepr, EnumIter, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CPAction {
    Left = 0,
    Right = 1,
}

impl From<CPAction> for usize {
    fn from(value: CPAction) -> Self {
        value as usize
    }
}

/// The classic CartPole reinforcement learning environment
///
/// A pole is attached by an unactuated joint to a cart moving along a frictionless track.
/// The agent earns a reward of 1 for every step the pole stays upright, and the episode
/// terminates once the pole leans past 12° or the cart leaves the track.
///
/// State: `[x, x_dot, theta, theta_dot]`
#[derive(Debug, Clone)]
pub struct CartPole {
    state: [f32; 4],
    rng: StdRng,
}

impl CartPole {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 4],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn is_terminal(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta)
    }
}

impl Environment for CartPole {
    type State = [f32; 4];
    type Action = CPAction;

    fn random_action(&mut self) -> Self::Action {
        *CPAction::VARIANTS
            .choose(&mut self.rng)
            .unwrap_or(&CPAction::Left)
    }

    fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = match action {
            CPAction::Left => -FORCE_MAG,
            CPAction::Right => FORCE_MAG,
        };
        let (sin, cos) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot.powi(2) * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos.powi(2) / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];

        if self.is_terminal() {
            Feedback::terminal(1.0)
        } else {
            Feedback::running(self.state, 1.0)
        }
    }

    fn reset(&mut self) -> Self::State {
        let dist = Uniform::new_inclusive(-0.05, 0.05);
        self.state = std::array::from_fn(|_| dist.sample(&mut self.rng));
        self.state
    }
}

impl DiscreteActionSpace for CartPole {
    fn actions(&self) -> Vec<Self::Action> {
        CPAction::VARIANTS.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_within_bounds() {
        let mut env = CartPole::new(0);
        for _ in 0..10 {
            let state = env.reset();
            assert!(
                state.iter().all(|x| x.abs() <= 0.05),
                "initial state sampled from [-0.05, 0.05]"
            );
        }
    }

    #[test]
    fn seeded_resets_are_reproducible() {
        let a = CartPole::new(9).reset();
        let b = CartPole::new(9).reset();
        assert_eq!(a, b, "same seed, same initial state");
    }

    #[test]
    fn single_step_dynamics() {
        let mut env = CartPole::new(0);
        env.state = [0.0; 4];
        let feedback = env.step(CPAction::Right);
        let next = feedback.next_state.unwrap();
        assert_eq!(feedback.reward, 1.0, "reward of one per step");
        assert_eq!(next[0], 0.0, "position integrates the old velocity");
        assert_eq!(next[2], 0.0, "angle integrates the old angular velocity");
        assert!(next[1] > 0.0, "pushing right accelerates the cart right");
        assert!(next[3] < 0.0, "and tips the pole left");
    }

    #[test]
    fn always_pushing_one_way_terminates() {
        let mut env = CartPole::new(1);
        env.reset();
        let mut steps = 0;
        loop {
            steps += 1;
            let feedback = env.step(CPAction::Left);
            if feedback.next_state.is_none() {
                assert_eq!(feedback.reward, 1.0, "terminal step is still rewarded");
                break;
            }
            assert!(steps < 200, "pole falls quickly");
        }
    }

    #[test]
    fn action_indices_match_order() {
        let env = CartPole::new(0);
        for (i, a) in env.actions().into_iter().enumerate() {
            assert_eq!(usize::from(a), i, "action index matches its position");
        }
    }
}
