pub mod dqn;

pub use dqn::{Algorithm, DQNAgent, DQNAgentConfig, DQNModel, EpisodeStats, LossKind, TargetUpdate};
