use std::{
    fs,
    ops::ControlFlow,
    path::{Path, PathBuf},
};

use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};
use log::{debug, info, warn};

use crate::{
    algo::{Algorithm, DQNAgent, EpisodeStats},
    analysis::{moving_average, AlgoResult, Stats},
    config::TrainingConfig,
    env::{DiscreteActionSpace, EnvId, Environment, TimeLimit},
    error::Result,
    gym::{Acrobot, CartPole, MountainCar, Pendulum},
    model::{QNetwork, QNetworkConfig},
};

/// Everything produced by one training run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub env: EnvId,
    pub algorithm: Algorithm,
    /// Total reward of each training episode
    pub training_rewards: Vec<f32>,
    /// Mean loss of each training episode that took at least one optimization step
    pub losses: Vec<f32>,
    /// Total reward of each greedy evaluation episode
    pub eval_rewards: Vec<f32>,
    pub stats: Stats,
    pub model_path: PathBuf,
    /// Whether the observer ended training before `num_episodes`
    pub stopped: bool,
}

impl RunResult {
    pub fn algo_result(&self) -> AlgoResult {
        AlgoResult {
            mean: self.stats.mean,
            std: self.stats.std,
            rewards: self.eval_rewards.clone(),
            training_rewards: self.training_rewards.clone(),
            losses: self.losses.clone(),
        }
    }
}

/// File stem of a saved policy network, e.g. `DDQN_CartPole-v1`
pub fn model_name(algorithm: Algorithm, env: EnvId) -> String {
    format!("{algorithm}_{env}")
}

/// Train `config.algorithm` on `env_id`, save the policy network in `out_dir`, then evaluate it
///
/// `observer` sees every finished episode and can end training early by returning
/// [`ControlFlow::Break`].
pub fn train_and_evaluate<B: AutodiffBackend>(
    env_id: EnvId,
    config: &TrainingConfig,
    device: B::Device,
    out_dir: impl AsRef<Path>,
    observer: impl FnMut(usize, &EpisodeStats) -> ControlFlow<()>,
) -> Result<RunResult> {
    let out_dir = out_dir.as_ref();
    match env_id {
        EnvId::CartPole => run::<B, _, 4>(
            env_id,
            config,
            |seed| Ok(CartPole::new(seed)),
            device,
            out_dir,
            observer,
        ),
        EnvId::Acrobot => run::<B, _, 6>(
            env_id,
            config,
            |seed| Ok(Acrobot::new(seed)),
            device,
            out_dir,
            observer,
        ),
        EnvId::MountainCar => run::<B, _, 2>(
            env_id,
            config,
            |seed| Ok(MountainCar::new(seed)),
            device,
            out_dir,
            observer,
        ),
        EnvId::Pendulum => run::<B, _, 3>(
            env_id,
            config,
            |seed| Pendulum::new(seed, config.pendulum_torque_bins),
            device,
            out_dir,
            observer,
        ),
    }
}

/// Load a policy network saved by [`train_and_evaluate`] and run it greedily for
/// `config.eval_episodes` episodes
///
/// The network shape comes from `config.hidden_size` and the environment, so both must match
/// the training run.
pub fn evaluate_saved<B: AutodiffBackend>(
    env_id: EnvId,
    config: &TrainingConfig,
    model_path: impl AsRef<Path>,
    device: B::Device,
) -> Result<Vec<f32>> {
    let model_path = model_path.as_ref();
    match env_id {
        EnvId::CartPole => {
            evaluate_model::<B, _, 4>(env_id, config, |seed| Ok(CartPole::new(seed)), model_path, device)
        }
        EnvId::Acrobot => {
            evaluate_model::<B, _, 6>(env_id, config, |seed| Ok(Acrobot::new(seed)), model_path, device)
        }
        EnvId::MountainCar => evaluate_model::<B, _, 2>(
            env_id,
            config,
            |seed| Ok(MountainCar::new(seed)),
            model_path,
            device,
        ),
        EnvId::Pendulum => evaluate_model::<B, _, 3>(
            env_id,
            config,
            |seed| Pendulum::new(seed, config.pendulum_torque_bins),
            model_path,
            device,
        ),
    }
}

/// Evaluation runs on its own environment so it never replays the training episodes
fn eval_seed(config: &TrainingConfig) -> u64 {
    config.seed_or_default().wrapping_add(1)
}

fn build_agent<B, E, const N: usize>(
    env: &TimeLimit<E>,
    config: &TrainingConfig,
    device: B::Device,
) -> Result<DQNAgent<B, QNetwork<B>, TimeLimit<E>, impl Optimizer<QNetwork<B>, B>, N>>
where
    B: AutodiffBackend,
    E: Environment<State = [f32; N]> + DiscreteActionSpace,
    E::Action: Into<usize>,
{
    let model = QNetworkConfig::new(N, env.actions().len())
        .with_hidden_size(config.hidden_size)
        .init::<B>(&device);
    let agent_config = config.agent_config::<TimeLimit<E>, QNetwork<B>, B>()?;
    Ok(DQNAgent::new(model, agent_config, device))
}

fn run<B, E, const N: usize>(
    env_id: EnvId,
    config: &TrainingConfig,
    make_env: impl Fn(u64) -> Result<E>,
    device: B::Device,
    out_dir: &Path,
    mut observer: impl FnMut(usize, &EpisodeStats) -> ControlFlow<()>,
) -> Result<RunResult>
where
    B: AutodiffBackend,
    E: Environment<State = [f32; N]> + DiscreteActionSpace,
    E::Action: Into<usize>,
{
    config.validate()?;
    let algorithm = config.algorithm;
    let max_steps = env_id.max_episode_steps();
    let mut env = TimeLimit::new(make_env(config.seed_or_default())?, max_steps);
    let mut agent = build_agent::<B, E, N>(&env, config, device.clone())?;

    info!(
        "training {algorithm} on {env_id} for {} episodes",
        config.num_episodes
    );

    let mut training_rewards = Vec::with_capacity(config.num_episodes);
    let mut losses = Vec::with_capacity(config.num_episodes);
    let mut stopped = false;
    for episode in 0..config.num_episodes {
        let stats = agent.go(&mut env);
        debug!(
            "episode {episode}: reward {:.1} in {} steps",
            stats.reward, stats.steps
        );
        training_rewards.push(stats.reward);
        losses.extend(stats.mean_loss);

        if (episode + 1) % config.log_interval == 0 {
            let window = config.smoothing_window.min(training_rewards.len());
            let recent = &training_rewards[training_rewards.len() - window..];
            let avg = moving_average(recent, window)?.first().copied().unwrap_or_default();
            info!(
                "[{algorithm} {env_id}] {}",
                progress(episode, config.num_episodes, &stats, window, avg)
            );
        }

        if observer(episode, &stats).is_break() {
            warn!("training stopped after {} episodes", episode + 1);
            stopped = true;
            break;
        }
    }

    fs::create_dir_all(out_dir)?;
    let model_path = out_dir
        .join(model_name(algorithm, env_id))
        .with_extension("mpk");
    agent.policy_net().clone().save(&model_path)?;
    info!("saved model to {}", model_path.display());

    let mut eval_env = TimeLimit::new(make_env(eval_seed(config))?, max_steps);
    let eval_rewards = agent.evaluate(&mut eval_env, config.eval_episodes);
    let stats = Stats::from_samples(&eval_rewards)?;
    report_evaluation(env_id, algorithm, &stats);

    Ok(RunResult {
        env: env_id,
        algorithm,
        training_rewards,
        losses,
        eval_rewards,
        stats,
        model_path,
        stopped,
    })
}

/// One progress line, e.g. `episode 25/600: reward 21.0, avg25 17.1, loss 0.0312, epsilon 0.604`
fn progress(episode: usize, episodes: usize, stats: &EpisodeStats, window: usize, avg: f32) -> String {
    let loss = match stats.mean_loss {
        Some(loss) => format!("{loss:.4}"),
        None => String::from("--"),
    };
    format!(
        "episode {}/{episodes}: reward {:.1}, avg{window} {avg:.1}, loss {loss}, epsilon {:.3}",
        episode + 1,
        stats.reward,
        stats.epsilon
    )
}

fn evaluate_model<B, E, const N: usize>(
    env_id: EnvId,
    config: &TrainingConfig,
    make_env: impl Fn(u64) -> Result<E>,
    model_path: &Path,
    device: B::Device,
) -> Result<Vec<f32>>
where
    B: AutodiffBackend,
    E: Environment<State = [f32; N]> + DiscreteActionSpace,
    E::Action: Into<usize>,
{
    let mut env = TimeLimit::new(make_env(eval_seed(config))?, env_id.max_episode_steps());
    let model = QNetworkConfig::new(N, env.actions().len())
        .with_hidden_size(config.hidden_size)
        .init::<B>(&device)
        .load(model_path, &device)?;
    let agent: DQNAgent<B, QNetwork<B>, TimeLimit<E>, _, N> = DQNAgent::new(
        model,
        config.agent_config::<TimeLimit<E>, QNetwork<B>, B>()?,
        device,
    );

    let rewards = agent.evaluate(&mut env, config.eval_episodes);
    if let Ok(stats) = Stats::from_samples(&rewards) {
        report_evaluation(env_id, config.algorithm, &stats);
    }
    Ok(rewards)
}

fn report_evaluation(env_id: EnvId, algorithm: Algorithm, stats: &Stats) {
    info!(
        "[{algorithm} {env_id}] evaluation: {:.2} ± {:.2}",
        stats.mean, stats.std
    );
    match env_id.reward_threshold() {
        Some(threshold) if stats.mean >= threshold => {
            info!("{env_id} solved (threshold {threshold})")
        }
        Some(threshold) => info!("{env_id} not solved (threshold {threshold})"),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};

    use super::*;
    use crate::algo::TargetUpdate;

    type B = Autodiff<NdArray>;

    fn small_config() -> TrainingConfig {
        TrainingConfig::new()
            .with_num_episodes(3)
            .with_batch_size(16)
            .with_memory_capacity(500)
            .with_hidden_size(16)
            .with_eval_episodes(2)
            .with_log_interval(1)
            .with_seed(Some(3))
    }

    #[test]
    fn cart_pole_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        let result = train_and_evaluate::<B>(
            EnvId::CartPole,
            &small_config(),
            Default::default(),
            dir.path(),
            |episode, _| {
                seen.push(episode);
                ControlFlow::Continue(())
            },
        )
        .unwrap();

        assert_eq!(seen, [0, 1, 2], "observer sees every episode");
        assert!(!result.stopped);
        assert_eq!(result.training_rewards.len(), 3);
        assert_eq!(result.eval_rewards.len(), 2);
        assert!(result.training_rewards.iter().all(|&r| r >= 1.0 && r <= 500.0));
        assert_eq!(result.model_path, dir.path().join("DDQN_CartPole-v1.mpk"));
        assert!(result.model_path.exists(), "model saved");

        let stats = Stats::from_samples(&result.eval_rewards).unwrap();
        assert_eq!(result.stats, stats);
        let algo = result.algo_result();
        assert_eq!(algo.rewards, result.eval_rewards);
        assert_eq!(algo.mean, stats.mean);
    }

    #[test]
    fn saved_model_reproduces_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config().with_algorithm(Algorithm::Dqn);
        let result = train_and_evaluate::<B>(
            EnvId::MountainCar,
            &config,
            Default::default(),
            dir.path(),
            |_, _| ControlFlow::Continue(()),
        )
        .unwrap();
        assert!(result
            .training_rewards
            .iter()
            .all(|&r| r >= -200.0 && r < 0.0), "at most 200 steps of -1");

        let rewards =
            evaluate_saved::<B>(EnvId::MountainCar, &config, &result.model_path, Default::default())
                .unwrap();
        assert_eq!(rewards, result.eval_rewards, "greedy policy is deterministic");
    }

    #[test]
    fn observer_stops_training() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config()
            .with_pendulum_torque_bins(3)
            .with_target_update(TargetUpdate::Hard { period: 10 });
        let result = train_and_evaluate::<B>(
            EnvId::Pendulum,
            &config,
            Default::default(),
            dir.path(),
            |_, _| ControlFlow::Break(()),
        )
        .unwrap();
        assert_eq!(result.training_rewards.len(), 1, "stopped after the first episode");
        assert!(result.stopped, "early stop reported to the caller");
        assert_eq!(result.losses.len(), 1, "200 steps fill a batch");
        assert!(result.model_path.exists());
    }

    #[test]
    fn progress_line_reports_loss() {
        let stats = EpisodeStats {
            reward: 21.0,
            steps: 21,
            mean_loss: Some(0.0312),
            epsilon: 0.6042,
        };
        assert_eq!(
            progress(24, 600, &stats, 25, 17.08),
            "episode 25/600: reward 21.0, avg25 17.1, loss 0.0312, epsilon 0.604"
        );

        let warmup = EpisodeStats { mean_loss: None, ..stats };
        assert!(
            progress(0, 600, &warmup, 1, 21.0).contains("loss --"),
            "placeholder before the first optimization step"
        );
    }

    #[test]
    fn invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config().with_gamma(2.0);
        let result = train_and_evaluate::<B>(
            EnvId::Acrobot,
            &config,
            Default::default(),
            dir.path(),
            |_, _| ControlFlow::Continue(()),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("DDQN_Acrobot-v1.mpk").exists());
    }
}
