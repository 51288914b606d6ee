use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

mod time_limit;

pub use time_limit::TimeLimit;

/// The result of an environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback<S> {
    /// The state reached by the action, or if terminal, `None`
    pub next_state: Option<S>,
    /// The reward received for the action
    pub reward: f32,
    /// `true` if the episode was cut short by a time limit while `next_state` is still valid
    pub truncated: bool,
}

impl<S> Feedback<S> {
    /// A non-terminal step
    pub fn running(next_state: S, reward: f32) -> Self {
        Self {
            next_state: Some(next_state),
            reward,
            truncated: false,
        }
    }

    /// A terminal step
    pub fn terminal(reward: f32) -> Self {
        Self {
            next_state: None,
            reward,
            truncated: false,
        }
    }

    /// Whether the episode is over, either by termination or by truncation
    pub fn is_done(&self) -> bool {
        self.truncated || self.next_state.is_none()
    }
}

/// Represents a Markov decision process, defining the dynamics of an environment
/// in which an agent can operate.
///
/// This base trait represents the common case of a discrete-time MDP with one agent.
pub trait Environment {
    /// A representation of the state of the environment to be passed to an agent
    type State: Clone;

    /// A representation of an action that an agent can take to affect the environment
    type Action: Clone;

    /// Pick an action uniformly at random
    fn random_action(&mut self) -> Self::Action;

    /// Update the environment in response to an action taken by an agent
    fn step(&mut self, action: Self::Action) -> Feedback<Self::State>;

    /// Reset the environment to an initial state
    ///
    /// **Returns** the state
    fn reset(&mut self) -> Self::State;
}

/// An environment with a finite action space
///
/// The returned actions are ordered, and converting an action `Into<usize>` must give its
/// position in this list. DQN relies on this to map Q value columns to actions.
pub trait DiscreteActionSpace: Environment {
    fn actions(&self) -> Vec<Self::Action>;
}

/// Identifiers for the classic control environments
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
pub enum EnvId {
    #[strum(serialize = "CartPole-v1")]
    #[serde(rename = "CartPole-v1")]
    CartPole,
    #[strum(serialize = "Acrobot-v1")]
    #[serde(rename = "Acrobot-v1")]
    Acrobot,
    #[strum(serialize = "MountainCar-v0")]
    #[serde(rename = "MountainCar-v0")]
    MountainCar,
    #[strum(serialize = "Pendulum-v1")]
    #[serde(rename = "Pendulum-v1")]
    Pendulum,
}

impl EnvId {
    /// Episode length after which the environment is truncated
    pub fn max_episode_steps(self) -> usize {
        match self {
            Self::CartPole | Self::Acrobot => 500,
            Self::MountainCar | Self::Pendulum => 200,
        }
    }

    /// Average evaluation reward at which the environment counts as solved
    pub fn reward_threshold(self) -> Option<f32> {
        match self {
            Self::CartPole => Some(475.0),
            Self::Acrobot => Some(-100.0),
            Self::MountainCar => Some(-110.0),
            Self::Pendulum => None,
        }
    }

    /// Length of the observation vector
    pub fn state_dim(self) -> usize {
        match self {
            Self::CartPole => 4,
            Self::Acrobot => 6,
            Self::MountainCar => 2,
            Self::Pendulum => 3,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    /// A corridor of length 3: action 1 moves right, action 0 stays. Reaching the end terminates.
    pub struct MockEnv {
        pub pos: usize,
    }

    impl Environment for MockEnv {
        type State = [f32; 1];
        type Action = usize;

        fn random_action(&mut self) -> Self::Action {
            0
        }

        fn step(&mut self, action: Self::Action) -> Feedback<Self::State> {
            self.pos += action;
            if self.pos >= 3 {
                Feedback::terminal(1.0)
            } else {
                Feedback::running([self.pos as f32], 0.0)
            }
        }

        fn reset(&mut self) -> Self::State {
            self.pos = 0;
            [0.0]
        }
    }

    impl DiscreteActionSpace for MockEnv {
        fn actions(&self) -> Vec<Self::Action> {
            vec![0, 1]
        }
    }

    #[test]
    fn env_id_names() {
        for id in EnvId::iter() {
            let name = id.to_string();
            assert_eq!(EnvId::from_str(&name).unwrap(), id, "name round trips");
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{name}\""), "serde uses the canonical name");
        }
        assert_eq!(EnvId::CartPole.as_ref(), "CartPole-v1");
        assert!(EnvId::from_str("LunarLander-v2").is_err());
    }

    #[test]
    fn feedback_done() {
        assert!(!Feedback::running(0, 1.0).is_done());
        assert!(Feedback::<i32>::terminal(1.0).is_done());
        let truncated = Feedback {
            next_state: Some(0),
            reward: 0.0,
            truncated: true,
        };
        assert!(truncated.is_done(), "truncation ends the episode");
    }
}
