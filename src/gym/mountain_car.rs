use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rand_distr::{Distribution, Uniform};
use strum::{EnumIter, FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Feedback};

const MIN_POSITION: f32 = -1.2;
const MAX_POSITION: f32 = 0.6;
const MAX_SPEED: f32 = 0.07;
const GOAL_POSITION: f32 = 0.5;
const GOAL_VELOCITY: f32 = 0.0;
const FORCE: f32 = 0.001;
const GRAVITY: f32 = 0.0025;

#[derive(FromRepr, EnumIter, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MCAction {
    Left = 0,
    Idle = 1,
    Right = 2,
}

impl From<MCAction> for usize {
    fn from(value: MCAction) -> Self {
        value as usize
    }
}

/// An underpowered car in a valley that must rock back and forth to reach the flag on the right hill
///
/// State: `[position, velocity]`
#[derive(Debug, Clone)]
pub struct MountainCar {
    state: [f32; 2],
    rng: StdRng,
}

impl MountainCar {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 2],
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Environment for MountainCar {
    type State = [f32; 2];
    type Action = MCAction;

    fn random_action(&mut self) -> Self::Action {
        *MCAction::VARIANTS
            .choose(&mut self.rng)
            .unwrap_or(&MCAction::Idle)
    }

    fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
        let [position, velocity] = self.state;
        let push = action as usize as f32 - 1.0;

        let velocity = (velocity + push * FORCE - (3.0 * position).cos() * GRAVITY)
            .clamp(-MAX_SPEED, MAX_SPEED);
        let position = (position + velocity).clamp(MIN_POSITION, MAX_POSITION);
        // inelastic collision with the left wall
        let velocity = if position == MIN_POSITION && velocity < 0.0 {
            0.0
        } else {
            velocity
        };
        self.state = [position, velocity];

        if position >= GOAL_POSITION && velocity >= GOAL_VELOCITY {
            Feedback::terminal(-1.0)
        } else {
            Feedback::running(self.state, -1.0)
        }
    }

    fn reset(&mut self) -> Self::State {
        let position = Uniform::new_inclusive(-0.6, -0.4).sample(&mut self.rng);
        self.state = [position, 0.0];
        self.state
    }
}

impl DiscreteActionSpace for MountainCar {
    fn actions(&self) -> Vec<Self::Action> {
        MCAction::VARIANTS.to_vec()
    }
}
