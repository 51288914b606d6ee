use std::f32::consts::PI;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rand_distr::{Distribution, Uniform};
use strum::{EnumIter, FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Feedback};

const DT: f32 = 0.2;
const LINK_LENGTH_1: f32 = 1.0;
const LINK_MASS_1: f32 = 1.0;
const LINK_MASS_2: f32 = 1.0;
/// Position of the center of mass of each link
const LINK_COM_POS_1: f32 = 0.5;
const LINK_COM_POS_2: f32 = 0.5;
/// Moment of inertia of each link
const LINK_MOI: f32 = 1.0;
const MAX_VEL_1: f32 = 4.0 * PI;
const MAX_VEL_2: f32 = 9.0 * PI;
const GRAVITY: f32 = 9.8;

/// Torque applied to the joint between the two links
#[derive(FromRepr, EnumIter, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcrobotAction {
    Negative = 0,
    Zero = 1,
    Positive = 2,
}

impl AcrobotAction {
    pub fn torque(self) -> f32 {
        self as usize as f32 - 1.0
    }
}

impl From<AcrobotAction> for usize {
    fn from(value: AcrobotAction) -> Self {
        value as usize
    }
}

/// Wrap `x` into the half-open interval `[lo, hi)`
fn wrap(mut x: f32, lo: f32, hi: f32) -> f32 {
    let diff = hi - lo;
    while x >= hi {
        x -= diff;
    }
    while x < lo {
        x += diff;
    }
    x
}

/// Time derivative of `[theta1, theta2, dtheta1, dtheta2]` under `torque`
fn dsdt(s: [f32; 4], torque: f32) -> [f32; 4] {
    let [theta1, theta2, dtheta1, dtheta2] = s;
    let (m1, m2) = (LINK_MASS_1, LINK_MASS_2);
    let (l1, lc1, lc2) = (LINK_LENGTH_1, LINK_COM_POS_1, LINK_COM_POS_2);
    let (i1, i2) = (LINK_MOI, LINK_MOI);

    let d1 = m1 * lc1.powi(2)
        + m2 * (l1.powi(2) + lc2.powi(2) + 2.0 * l1 * lc2 * theta2.cos())
        + i1
        + i2;
    let d2 = m2 * (lc2.powi(2) + l1 * lc2 * theta2.cos()) + i2;
    let phi2 = m2 * lc2 * GRAVITY * (theta1 + theta2 - PI / 2.0).cos();
    let phi1 = -m2 * l1 * lc2 * dtheta2.powi(2) * theta2.sin()
        - 2.0 * m2 * l1 * lc2 * dtheta2 * dtheta1 * theta2.sin()
        + (m1 * lc1 + m2 * l1) * GRAVITY * (theta1 - PI / 2.0).cos()
        + phi2;
    let ddtheta2 = (torque + d2 / d1 * phi1
        - m2 * l1 * lc2 * dtheta1.powi(2) * theta2.sin()
        - phi2)
        / (m2 * lc2.powi(2) + i2 - d2.powi(2) / d1);
    let ddtheta1 = -(d2 * ddtheta2 + phi1) / d1;

    [dtheta1, dtheta2, ddtheta1, ddtheta2]
}

/// One fourth-order Runge-Kutta step of length `dt`
fn rk4(s: [f32; 4], torque: f32, dt: f32) -> [f32; 4] {
    let add = |a: [f32; 4], b: [f32; 4], h: f32| -> [f32; 4] {
        std::array::from_fn(|i| a[i] + h * b[i])
    };
    let k1 = dsdt(s, torque);
    let k2 = dsdt(add(s, k1, dt / 2.0), torque);
    let k3 = dsdt(add(s, k2, dt / 2.0), torque);
    let k4 = dsdt(add(s, k3, dt), torque);
    std::array::from_fn(|i| s[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
}

/// A two-link pendulum with only the middle joint actuated
///
/// The agent must swing the free end above a height of one link length over the fixed base.
/// Every step that does not reach the goal costs -1.
///
/// State: `[cos θ1, sin θ1, cos θ2, sin θ2, θ̇1, θ̇2]`
#[derive(Debug, Clone)]
pub struct Acrobot {
    state: [f32; 4],
    rng: StdRng,
}

impl Acrobot {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 4],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn observation(&self) -> [f32; 6] {
        let [theta1, theta2, dtheta1, dtheta2] = self.state;
        [
            theta1.cos(),
            theta1.sin(),
            theta2.cos(),
            theta2.sin(),
            dtheta1,
            dtheta2,
        ]
    }

    fn is_terminal(&self) -> bool {
        let [theta1, theta2, ..] = self.state;
        -theta1.cos() - (theta1 + theta2).cos() > 1.0
    }
}

impl Environment for Acrobot {
    type State = [f32; 6];
    type Action = AcrobotAction;

    fn random_action(&mut self) -> Self::Action {
        *AcrobotAction::VARIANTS
            .choose(&mut self.rng)
            .unwrap_or(&AcrobotAction::Zero)
    }

    fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
        let [theta1, theta2, dtheta1, dtheta2] = rk4(self.state, action.torque(), DT);
        self.state = [
            wrap(theta1, -PI, PI),
            wrap(theta2, -PI, PI),
            dtheta1.clamp(-MAX_VEL_1, MAX_VEL_1),
            dtheta2.clamp(-MAX_VEL_2, MAX_VEL_2),
        ];

        if self.is_terminal() {
            Feedback::terminal(0.0)
        } else {
            Feedback::running(self.observation(), -1.0)
        }
    }

    fn reset(&mut self) -> Self::State {
        let dist = Uniform::new_inclusive(-0.1, 0.1);
        self.state = std::array::from_fn(|_| dist.sample(&mut self.rng));
        self.observation()
    }
}

impl DiscreteActionSpace for Acrobot {
    fn actions(&self) -> Vec<Self::Action> {
        AcrobotAction::VARIANTS.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_functional() {
        assert_eq!(wrap(0.5, -PI, PI), 0.5);
        assert!((wrap(PI + 0.5, -PI, PI) - (-PI + 0.5)).abs() < 1e-5);
        assert!((wrap(-PI - 0.5, -PI, PI) - (PI - 0.5)).abs() < 1e-5);
    }

    #[test]
    fn hanging_at_rest_is_equilibrium() {
        let next = rk4([0.0; 4], 0.0, DT);
        assert!(
            next.iter().all(|x| x.abs() < 1e-6),
            "no torque, no motion from the bottom"
        );
    }

    #[test]
    fn observation_layout() {
        let mut env = Acrobot::new(0);
        let obs = env.reset();
        let [theta1, theta2, dtheta1, dtheta2] = env.state;
        assert_eq!(obs[0], theta1.cos());
        assert_eq!(obs[1], theta1.sin());
        assert_eq!(obs[2], theta2.cos());
        assert_eq!(obs[3], theta2.sin());
        assert_eq!(obs[4], dtheta1);
        assert_eq!(obs[5], dtheta2);
        assert!(env.state.iter().all(|x| x.abs() <= 0.1), "reset in [-0.1, 0.1]");
    }

    #[test]
    fn step_costs_and_bounds() {
        let mut env = Acrobot::new(3);
        env.reset();
        for _ in 0..50 {
            let feedback = env.step(AcrobotAction::Positive);
            if feedback.next_state.is_some() {
                assert_eq!(feedback.reward, -1.0, "each running step costs one");
            } else {
                assert_eq!(feedback.reward, 0.0, "reaching the goal is free");
                break;
            }
            let [theta1, theta2, dtheta1, dtheta2] = env.state;
            assert!((-PI..PI).contains(&theta1) && (-PI..PI).contains(&theta2));
            assert!(dtheta1.abs() <= MAX_VEL_1 && dtheta2.abs() <= MAX_VEL_2);
        }
    }

    #[test]
    fn upright_is_terminal() {
        let mut env = Acrobot::new(0);
        env.state = [PI, 0.0, 0.0, 0.0];
        assert!(env.is_terminal(), "both links pointing up");
        env.state = [0.0; 4];
        assert!(!env.is_terminal(), "hanging down");
    }
}
