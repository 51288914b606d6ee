use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use crate::{
    env::{DiscreteActionSpace, Environment, Feedback},
    error::{Error, Result},
};

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const GRAVITY: f32 = 10.0;
const MASS: f32 = 1.0;
const LENGTH: f32 = 1.0;

/// One of the evenly spaced torques of a discretized [`Pendulum`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendulumAction {
    index: usize,
    torque: f32,
}

impl PendulumAction {
    pub fn torque(self) -> f32 {
        self.torque
    }
}

impl From<PendulumAction> for usize {
    fn from(value: PendulumAction) -> Self {
        value.index
    }
}

/// Normalize an angle into `[-π, π)`
fn angle_normalize(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

/// The inverted pendulum swing-up problem
///
/// The torque is continuous in `[-2, 2]`, so it is split into a fixed number of evenly spaced
/// actions for the discrete-action agents here. The episode never terminates on its own.
///
/// State: `[cos θ, sin θ, θ̇]`
#[derive(Debug, Clone)]
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,
    actions: Vec<PendulumAction>,
    rng: StdRng,
}

impl Pendulum {
    /// Fails unless `bins >= 2`
    pub fn new(seed: u64, bins: usize) -> Result<Self> {
        if bins < 2 {
            return Err(Error::InvalidHyperparameter {
                name: "pendulum_torque_bins",
                value: bins as f64,
                reason: "need at least two torque levels",
            });
        }
        let spacing = 2.0 * MAX_TORQUE / (bins - 1) as f32;
        let actions = (0..bins)
            .map(|index| PendulumAction {
                index,
                torque: -MAX_TORQUE + spacing * index as f32,
            })
            .collect();
        Ok(Self {
            theta: 0.0,
            theta_dot: 0.0,
            actions,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn observation(&self) -> [f32; 3] {
        [self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

impl Environment for Pendulum {
    type State = [f32; 3];
    type Action = PendulumAction;

    fn random_action(&mut self) -> Self::Action {
        self.actions[self.rng.gen_range(0..self.actions.len())]
    }

    fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
        let u = action.torque.clamp(-MAX_TORQUE, MAX_TORQUE);
        let th = self.theta;
        let thdot = self.theta_dot;

        let cost = angle_normalize(th).powi(2) + 0.1 * thdot.powi(2) + 0.001 * u.powi(2);

        let new_thdot = (thdot
            + (3.0 * GRAVITY / (2.0 * LENGTH) * th.sin() + 3.0 / (MASS * LENGTH.powi(2)) * u) * DT)
            .clamp(-MAX_SPEED, MAX_SPEED);
        self.theta = th + new_thdot * DT;
        self.theta_dot = new_thdot;

        Feedback::running(self.observation(), -cost)
    }

    fn reset(&mut self) -> Self::State {
        self.theta = Uniform::new_inclusive(-PI, PI).sample(&mut self.rng);
        self.theta_dot = Uniform::new_inclusive(-1.0, 1.0).sample(&mut self.rng);
        self.observation()
    }
}

impl DiscreteActionSpace for Pendulum {
    fn actions(&self) -> Vec<Self::Action> {
        self.actions.clone()
    }
}
