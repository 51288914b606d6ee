//! DQN and Double DQN agents for the classic control environments
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use deepq::{env::EnvId, train::train_and_evaluate, TrainingConfig};
//!
//! let config = TrainingConfig::new().with_seed(Some(0));
//! let run = train_and_evaluate::<Autodiff<NdArray>>(
//!     EnvId::CartPole,
//!     &config,
//!     Default::default(),
//!     "results",
//!     |_, _| std::ops::ControlFlow::Continue(()),
//! )?;
//! println!("{:.1} ± {:.1}", run.stats.mean, run.stats.std);
//! ```

/// Implemented RL algorithms
pub mod algo;

/// Smoothing, summary statistics and result tables
pub mod analysis;

/// Training hyperparameters
pub mod config;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Data structures
pub mod ds;

/// Environment
pub mod env;

/// Exploration policies
pub mod exploration;

/// Classic control environments
pub mod gym;

/// Experience replay
pub mod memory;

/// Q networks
pub mod model;

/// Report charts
#[cfg(feature = "plot")]
pub mod plot;

/// Training and evaluation runs
pub mod train;

/// Conversions into burn tensors
pub mod traits;

/// Terminal dashboard
#[cfg(feature = "viz")]
pub mod viz;

mod error;
mod util;

pub use config::TrainingConfig;
pub use error::{Error, Result};
