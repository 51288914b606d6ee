use burn::{
    config::Config,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, Optimizer},
    tensor::backend::AutodiffBackend,
};

use crate::{
    algo::{Algorithm, DQNAgentConfig, LossKind, TargetUpdate},
    env::Environment,
    error::Error,
    exploration::EpsilonGreedy,
    memory::ReplayMemory,
    util::{check_interval, check_positive},
};

/// Hyperparameters for one training run
///
/// Saved and loaded as JSON:
/// ```ignore
/// let config = TrainingConfig::new().with_gamma(0.995);
/// config.save("config.json")?;
/// let config = TrainingConfig::load("config.json")?;
/// ```
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "Algorithm::DoubleDqn")]
    pub algorithm: Algorithm,
    #[config(default = 600)]
    pub num_episodes: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    /// Discount factor
    #[config(default = 0.99)]
    pub gamma: f32,
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    #[config(default = 0.9)]
    pub eps_start: f32,
    #[config(default = 0.05)]
    pub eps_end: f32,
    /// Time constant of the exponential epsilon schedule, in action selections
    #[config(default = 1000.0)]
    pub eps_decay: f32,
    #[config(default = 10000)]
    pub memory_capacity: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = "TargetUpdate::Soft { tau: 0.005 }")]
    pub target_update: TargetUpdate,
    #[config(default = "LossKind::Huber")]
    pub loss: LossKind,
    /// Gradients are clipped elementwise to this magnitude
    #[config(default = 100.0)]
    pub grad_clip: f32,
    #[config(default = 100)]
    pub eval_episodes: usize,
    /// Episodes between progress log lines
    #[config(default = 25)]
    pub log_interval: usize,
    /// Window of the reward moving average in logs and plots
    #[config(default = 50)]
    pub smoothing_window: usize,
    /// Discretization of the pendulum torque
    #[config(default = 5)]
    pub pendulum_torque_bins: usize,
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Check every hyperparameter against its admissible range
    pub fn validate(&self) -> crate::Result<()> {
        check_interval("gamma", self.gamma.into(), 0.0, 1.0)?;
        check_interval("eps_start", self.eps_start.into(), 0.0, 1.0)?;
        check_interval("eps_end", self.eps_end.into(), 0.0, self.eps_start.into())?;
        check_positive("eps_decay", self.eps_decay.into())?;
        check_positive("learning_rate", self.learning_rate)?;
        check_positive("batch_size", self.batch_size as f64)?;
        check_positive("num_episodes", self.num_episodes as f64)?;
        check_positive("hidden_size", self.hidden_size as f64)?;
        check_positive("grad_clip", self.grad_clip.into())?;
        check_positive("eval_episodes", self.eval_episodes as f64)?;
        check_positive("log_interval", self.log_interval as f64)?;
        check_positive("smoothing_window", self.smoothing_window as f64)?;
        if self.memory_capacity < self.batch_size {
            return Err(Error::InvalidHyperparameter {
                name: "memory_capacity",
                value: self.memory_capacity as f64,
                reason: "must hold at least one batch",
            });
        }
        match self.target_update {
            TargetUpdate::Soft { tau } => check_interval("tau", tau.into(), f64::MIN_POSITIVE, 1.0),
            TargetUpdate::Hard { period } => check_positive("period", period as f64),
        }
    }

    /// Set one hyperparameter from its textual value, as given to `deepq sweep`
    ///
    /// `tau` switches to soft target updates and `target_period` to hard ones.
    pub fn with_parameter(mut self, name: &str, value: &str) -> crate::Result<Self> {
        fn parse<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
            value.parse().map_err(|_| Error::ParameterValue {
                name: name.to_owned(),
                value: value.to_owned(),
            })
        }

        match name {
            "gamma" => self.gamma = parse(name, value)?,
            "learning_rate" => self.learning_rate = parse(name, value)?,
            "batch_size" => self.batch_size = parse(name, value)?,
            "eps_start" => self.eps_start = parse(name, value)?,
            "eps_end" => self.eps_end = parse(name, value)?,
            "eps_decay" => self.eps_decay = parse(name, value)?,
            "memory_capacity" => self.memory_capacity = parse(name, value)?,
            "hidden_size" => self.hidden_size = parse(name, value)?,
            "grad_clip" => self.grad_clip = parse(name, value)?,
            "tau" => {
                self.target_update = TargetUpdate::Soft {
                    tau: parse(name, value)?,
                }
            }
            "target_period" => {
                self.target_update = TargetUpdate::Hard {
                    period: parse(name, value)?,
                }
            }
            "loss" => {
                self.loss = match value.to_ascii_lowercase().as_str() {
                    "huber" => LossKind::Huber,
                    "mse" => LossKind::Mse,
                    _ => {
                        return Err(Error::ParameterValue {
                            name: name.to_owned(),
                            value: value.to_owned(),
                        })
                    }
                }
            }
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(self)
    }

    /// The seed used for the environment and agent when none is configured
    pub fn seed_or_default(&self) -> u64 {
        self.seed.unwrap_or(0)
    }

    /// Assemble the agent components described by this config
    pub fn agent_config<E, M, B>(&self) -> crate::Result<DQNAgentConfig<E, impl Optimizer<M, B>>>
    where
        E: Environment,
        M: AutodiffModule<B>,
        B: AutodiffBackend,
    {
        self.validate()?;
        Ok(DQNAgentConfig {
            memory: ReplayMemory::new(self.memory_capacity, self.batch_size)?,
            optimizer: AdamWConfig::new()
                .with_grad_clipping(Some(GradientClippingConfig::Value(self.grad_clip)))
                .init(),
            exploration: EpsilonGreedy::exponential(self.eps_start, self.eps_end, self.eps_decay)?,
            algorithm: self.algorithm,
            loss: self.loss,
            gamma: self.gamma,
            target_update: self.target_update,
            lr: self.learning_rate,
            seed: self.seed_or_default(),
        })
    }
}
