use burn::{
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Int, Tensor},
};
use log::warn;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
    decay,
    env::{DiscreteActionSpace, Environment, Feedback},
    exploration::{Choice, EpsilonGreedy},
    memory::{Exp, ReplayMemory},
    traits::ToTensor,
};

/// A burn module used with a Deep Q network agent
///
/// ### Generics
/// - `B`: A burn backend
pub trait DQNModel<B: AutodiffBackend>: AutodiffModule<B> {
    /// Forward pass through the model, mapping a `[batch, state]` input to `[batch, actions]` Q values
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Soft update the parameters of the target network
    ///
    /// θ′ ← τθ + (1 − τ)θ′
    ///
    /// ```ignore
    /// target_net = target_net.soft_update(&policy_net, tau);
    /// ```
    fn soft_update(self, other: &Self, tau: f32) -> Self;
}

/// Which temporal difference target the agent bootstraps from
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
#[strum(ascii_case_insensitive)]
pub enum Algorithm {
    /// r + γ max<sub>a</sub> Q<sub>target</sub>(s′, a)
    #[strum(serialize = "DQN")]
    #[serde(rename = "DQN")]
    Dqn,
    /// r + γ Q<sub>target</sub>(s′, argmax<sub>a</sub> Q<sub>policy</sub>(s′, a))
    #[strum(serialize = "DDQN")]
    #[serde(rename = "DDQN")]
    DoubleDqn,
}

/// How the target network follows the policy network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetUpdate {
    /// Blend the policy parameters into the target after every optimization step
    Soft { tau: f32 },
    /// Copy the policy parameters into the target every `period` optimization steps
    Hard { period: usize },
}

/// Regression loss between predicted Q values and TD targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    /// Smooth L1 with δ = 1
    #[default]
    Huber,
    Mse,
}

impl LossKind {
    pub fn forward<B: Backend>(self, pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Self::Mse => MseLoss::new().forward(pred, target, Reduction::Mean),
            Self::Huber => {
                let diff = pred - target;
                let abs = diff.clone().abs();
                let quadratic = diff.clone() * diff * 0.5;
                let linear = abs.clone() - 0.5;
                quadratic.mask_where(abs.greater_elem(1.0), linear).mean()
            }
        }
    }
}

/// Configuration for the [`DQNAgent`] (see for information on generic types)
pub struct DQNAgentConfig<E, O>
where
    E: Environment,
{
    /// A [`ReplayMemory`] to store and sample the agent's past experiences
    pub memory: ReplayMemory<E>,
    /// The [`Optimizer`] to train the policy network with
    pub optimizer: O,
    /// The exploration policy
    pub exploration: EpsilonGreedy<decay::Exponential>,
    pub algorithm: Algorithm,
    pub loss: LossKind,
    /// The discount factor
    pub gamma: f32,
    pub target_update: TargetUpdate,
    /// The learning rate for the optimizer
    pub lr: f64,
    /// Seeds the agent's replay sampling and exploration
    pub seed: u64,
}

/// Summary of one training episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    pub reward: f32,
    pub steps: usize,
    /// Mean loss over the optimization steps of the episode, if any were taken
    pub mean_loss: Option<f32>,
    /// Exploration probability at the end of the episode
    pub epsilon: f32,
}

/// A Deep Q Network agent, covering both DQN and Double DQN
///
/// ### Generics
/// - `B`: A burn backend
/// - `M`: The [`DQNModel`] used for the policy and target networks
/// - `E`: The [`Environment`] in which the agent will learn
///     - The environment's action space must be discrete, since the policy network produces a Q value for each action.
///     - States are fixed-length observation vectors `[f32; N]`.
/// - `O`: An [`Optimizer`]
/// - `N`: The length of the observation vector
pub struct DQNAgent<B, M, E, O, const N: usize>
where
    B: AutodiffBackend,
    E: Environment,
{
    policy_net: M,
    target_net: M,
    device: B::Device,
    memory: ReplayMemory<E>,
    optimizer: O,
    exploration: EpsilonGreedy<decay::Exponential>,
    algorithm: Algorithm,
    loss: LossKind,
    gamma: f32,
    target_update: TargetUpdate,
    lr: f64,
    steps_done: u64,
    learn_steps: u64,
    rng: StdRng,
}

impl<B, M, E, O, const N: usize> DQNAgent<B, M, E, O, N>
where
    B: AutodiffBackend,
    M: DQNModel<B>,
    E: Environment<State = [f32; N]> + DiscreteActionSpace,
    E::Action: Into<usize>,
    O: Optimizer<M, B>,
{
    /// Initialize a new `DQNAgent`
    ///
    /// ### Arguments
    /// - `model` A [`DQNModel`] to be used as the policy and target networks
    /// - `config` A [`DQNAgentConfig`] containing components and hyperparameters for the agent
    /// - `device` The device used for the `model`
    pub fn new(model: M, config: DQNAgentConfig<E, O>, device: B::Device) -> Self {
        let target_net = model.clone();
        Self {
            policy_net: model,
            target_net,
            device,
            memory: config.memory,
            optimizer: config.optimizer,
            exploration: config.exploration,
            algorithm: config.algorithm,
            loss: config.loss,
            gamma: config.gamma,
            target_update: config.target_update,
            lr: config.lr,
            steps_done: 0,
            learn_steps: 0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Invoke the agent's policy along with the exploration strategy to choose an action from the given state
    pub fn act(&mut self, env: &mut E, state: [f32; N]) -> E::Action {
        let (choice, steps_done) = self.exploration.choose(self.steps_done, &mut self.rng);
        self.steps_done = steps_done;
        match choice {
            Choice::Explore => env.random_action(),
            Choice::Exploit => self.greedy_action(env, state),
        }
    }

    /// The action with the highest Q value under the policy network
    pub fn greedy_action(&self, env: &mut E, state: [f32; N]) -> E::Action {
        let input: Tensor<B, 2> = vec![state].to_tensor(&self.device);
        let ix = self
            .policy_net
            .forward(input)
            .argmax(1)
            .into_scalar()
            .elem::<i64>() as usize;
        match env.actions().into_iter().nth(ix) {
            Some(action) => action,
            None => {
                warn!("policy network produced action index {ix} outside the action space");
                env.random_action()
            }
        }
    }

    /// Bootstrapped value of each next state, shaped `[batch, 1]`
    fn next_q_values(&self, next_states: Tensor<B, 2>) -> Tensor<B, 2> {
        match self.algorithm {
            Algorithm::Dqn => self.target_net.forward(next_states).max_dim(1),
            Algorithm::DoubleDqn => {
                let best_actions = self.policy_net.forward(next_states.clone()).argmax(1);
                self.target_net.forward(next_states).gather(1, best_actions)
            }
        }
    }

    fn update_target(&mut self) {
        match self.target_update {
            TargetUpdate::Soft { tau } => {
                let target_net = self.target_net.clone();
                self.target_net = target_net.soft_update(&self.policy_net, tau);
            }
            TargetUpdate::Hard { period } => {
                if period > 0 && self.learn_steps % period as u64 == 0 {
                    self.target_net = self.policy_net.clone();
                }
            }
        }
    }

    /// Perform one learning step on a batch sampled from memory
    ///
    /// **Returns** the loss, or `None` while the memory holds fewer experiences than a batch
    pub fn learn(&mut self) -> Option<f32> {
        let batch = self.memory.sample_zipped(&mut self.rng)?;

        // Terminal next states are zero-filled and masked out of the bootstrap term
        let non_terminal = batch
            .next_states
            .iter()
            .map(|s| if s.is_some() { 1.0 } else { 0.0 })
            .collect::<Vec<f32>>();
        let next_states = batch
            .next_states
            .into_iter()
            .map(|s| s.unwrap_or([0.0; N]))
            .collect::<Vec<_>>();
        let actions = batch
            .actions
            .into_iter()
            .map(Into::into)
            .collect::<Vec<usize>>();

        let states: Tensor<B, 2> = batch.states.to_tensor(&self.device);
        let next_states: Tensor<B, 2> = next_states.to_tensor(&self.device);
        let actions: Tensor<B, 2, Int> = actions.to_tensor(&self.device);
        let rewards: Tensor<B, 2> = batch.rewards.to_tensor(&self.device);
        let non_terminal: Tensor<B, 2> = non_terminal.to_tensor(&self.device);

        // Q values of the chosen actions in each state
        let q_values = self.policy_net.forward(states).gather(1, actions);

        let next_q_values = self.next_q_values(next_states).detach();
        let expected_return = rewards + next_q_values * non_terminal * self.gamma;

        let loss = self.loss.forward(q_values, expected_return);

        let grads = GradientsParams::from_grads(loss.backward(), &self.policy_net);
        self.policy_net = self
            .optimizer
            .step(self.lr, self.policy_net.clone(), grads);
        self.learn_steps += 1;

        self.update_target();

        Some(loss.into_scalar().elem::<f32>())
    }

    /// Deploy the `DQNAgent` into the environment for one training episode
    ///
    /// The environment must end its episodes, wrap it in a [`TimeLimit`](crate::env::TimeLimit) if it never terminates.
    pub fn go(&mut self, env: &mut E) -> EpisodeStats {
        let mut state = env.reset();
        let mut stats = EpisodeStats::default();
        let mut losses = Vec::new();

        loop {
            let action = self.act(env, state);
            let Feedback {
                next_state,
                reward,
                truncated,
            } = env.step(action.clone());

            self.memory.push(Exp {
                state,
                action,
                next_state,
                reward,
            });
            stats.reward += reward;
            stats.steps += 1;

            if let Some(loss) = self.learn() {
                losses.push(loss);
            }

            match next_state {
                Some(next) if !truncated => state = next,
                _ => break,
            }
        }

        stats.mean_loss =
            (!losses.is_empty()).then(|| losses.iter().sum::<f32>() / losses.len() as f32);
        stats.epsilon = self.epsilon();
        stats
    }

    /// Run the greedy policy for `episodes` episodes without learning
    ///
    /// **Returns** the total reward of each episode
    pub fn evaluate(&self, env: &mut E, episodes: usize) -> Vec<f32> {
        (0..episodes)
            .map(|_| {
                let mut state = env.reset();
                let mut total = 0.0;
                loop {
                    let action = self.greedy_action(env, state);
                    let feedback = env.step(action);
                    total += feedback.reward;
                    match feedback.next_state {
                        Some(next) if !feedback.truncated => state = next,
                        _ => break total,
                    }
                }
            })
            .collect()
    }

    /// Current exploration probability
    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon(self.steps_done)
    }

    /// Number of epsilon greedy action selections so far
    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    /// Number of optimization steps so far
    pub fn learn_steps(&self) -> u64 {
        self.learn_steps
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn policy_net(&self) -> &M {
        &self.policy_net
    }

    pub fn target_net(&self) -> &M {
        &self.target_net
    }

    pub fn into_policy_net(self) -> M {
        self.policy_net
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamWConfig,
    };

    use crate::{
        env::{tests::MockEnv, TimeLimit},
        gym::CartPole,
        model::{QNetwork, QNetworkConfig},
    };

    use super::*;

    type B = Autodiff<NdArray>;

    fn agent_config<E: Environment>(
        algorithm: Algorithm,
        target_update: TargetUpdate,
        eps: f32,
    ) -> DQNAgentConfig<E, impl Optimizer<QNetwork<B>, B>> {
        DQNAgentConfig {
            memory: ReplayMemory::new(1000, 4).unwrap(),
            optimizer: AdamWConfig::new().init(),
            exploration: EpsilonGreedy::new(decay::Exponential::new(0.0, eps, eps).unwrap()),
            algorithm,
            loss: LossKind::Huber,
            gamma: 0.99,
            target_update,
            lr: 1e-3,
            seed: 0,
        }
    }

    fn mock_agent(
        target_update: TargetUpdate,
        eps: f32,
    ) -> DQNAgent<B, QNetwork<B>, TimeLimit<MockEnv>, impl Optimizer<QNetwork<B>, B>, 1> {
        let device = Default::default();
        let model = QNetworkConfig::new(1, 2).with_hidden_size(8).init::<B>(&device);
        DQNAgent::new(model, agent_config(Algorithm::Dqn, target_update, eps), device)
    }

    fn q_values<M: DQNModel<B>>(model: &M) -> Vec<f32> {
        let device = Default::default();
        let input = Tensor::<B, 2>::from_floats([[0.0], [1.0], [2.0]], &device);
        model.forward(input).into_data().convert::<f32>().value
    }

    #[test]
    fn learn_waits_for_a_full_batch() {
        let mut agent = mock_agent(TargetUpdate::Soft { tau: 0.01 }, 1.0);
        assert!(agent.learn().is_none(), "nothing to learn from yet");

        let mut env = TimeLimit::new(MockEnv { pos: 0 }, 10);
        let stats = agent.go(&mut env);
        assert_eq!(stats.steps, 10, "exploring agent never moves and is truncated");
        assert_eq!(agent.memory_len(), 10, "every transition is stored");
        assert_eq!(agent.learn_steps(), 7, "learning starts once a batch is available");
        assert!(stats.mean_loss.is_some_and(f32::is_finite), "finite loss reported");
        assert_eq!(agent.steps_done(), 10, "one selection per step");
    }

    #[test]
    fn evaluation_leaves_counter_alone() {
        let agent = mock_agent(TargetUpdate::Soft { tau: 0.01 }, 1.0);
        let mut env = TimeLimit::new(MockEnv { pos: 0 }, 5);
        let rewards = agent.evaluate(&mut env, 3);
        assert_eq!(rewards.len(), 3, "one total per episode");
        assert_eq!(agent.steps_done(), 0, "greedy evaluation does not explore");
    }

    #[test]
    fn hard_update_copies_policy() {
        let mut agent = mock_agent(TargetUpdate::Hard { period: 3 }, 1.0);
        for _ in 0..4 {
            agent.memory.push(Exp {
                state: [0.0],
                action: 1,
                next_state: Some([1.0]),
                reward: 1.0,
            });
        }
        agent.learn();
        agent.learn();
        assert_ne!(
            q_values(agent.policy_net()),
            q_values(agent.target_net()),
            "target lags behind between copies"
        );
        agent.learn();
        assert_eq!(
            q_values(agent.policy_net()),
            q_values(agent.target_net()),
            "target copied on the third step"
        );
    }

    #[test]
    fn loss_kinds() {
        let device = Default::default();
        let pred = Tensor::<NdArray, 2>::from_floats([[0.0], [0.0]], &device);
        let target = Tensor::<NdArray, 2>::from_floats([[0.5], [3.0]], &device);
        let huber = LossKind::Huber
            .forward(pred.clone(), target.clone())
            .into_scalar();
        // (0.5 * 0.25 + (3 - 0.5)) / 2
        assert!((huber - 1.3125).abs() < 1e-6, "quadratic near zero, linear beyond one");
        let mse = LossKind::Mse.forward(pred, target).into_scalar();
        assert!((mse - 4.625).abs() < 1e-6);
    }

    #[test]
    fn double_dqn_target_uses_policy_argmax() {
        let device = Default::default();
        let model = QNetworkConfig::new(4, 2).with_hidden_size(8).init::<B>(&device);
        let mut agent: DQNAgent<B, _, CartPole, _, 4> = DQNAgent::new(
            model,
            agent_config(Algorithm::DoubleDqn, TargetUpdate::Soft { tau: 0.5 }, 0.5),
            device,
        );
        let mut env = CartPole::new(0);
        agent.go(&mut env);
        agent.go(&mut env);
        assert!(agent.learn_steps() > 0, "learned during the episodes");

        let next_states = Tensor::<B, 2>::from_floats([[0.0, 0.1, 0.0, -0.1]], &device);
        let policy_q = agent.policy_net().forward(next_states.clone());
        let target_q = agent.target_net().forward(next_states.clone());
        let best = policy_q.argmax(1).into_scalar().elem::<i64>() as usize;
        let expected = target_q.into_data().convert::<f32>().value[best];
        let actual = agent
            .next_q_values(next_states)
            .into_data()
            .convert::<f32>()
            .value[0];
        assert_eq!(actual, expected, "target network evaluates the policy's choice");
    }

    #[test]
    fn masked_terminal_targets() {
        let mut agent = mock_agent(TargetUpdate::Soft { tau: 0.01 }, 1.0);
        for _ in 0..4 {
            agent.memory.push(Exp {
                state: [2.0],
                action: 1,
                next_state: None,
                reward: 1.0,
            });
        }
        for _ in 0..1000 {
            agent.learn();
        }
        let device = Default::default();
        let q = agent
            .policy_net()
            .forward(Tensor::<B, 2>::from_floats([[2.0]], &device))
            .into_data()
            .convert::<f32>()
            .value;
        assert!(
            (q[1] - 1.0).abs() < 0.1,
            "terminal transitions regress to the bare reward, got {}",
            q[1]
        );
    }
}
