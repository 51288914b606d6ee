use burn::{config::ConfigError, record::RecorderError};

/// Errors produced while configuring, training, or reporting on agents
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid decay: `vi - vf` must have the same sign as `rate` (rate={rate}, vi={vi}, vf={vf})")]
    InvalidDecay { rate: f32, vi: f32, vf: f32 },

    #[error("invalid value for `{name}` ({value}): {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid value for `{name}` ({value}): must be in the interval [{low}, {high}]")]
    OutOfInterval {
        name: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),

    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("`{0}` needs at least one value")]
    EmptySeries(&'static str),

    #[error("unknown hyperparameter `{0}`")]
    UnknownParameter(String),

    #[error("cannot set `{name}` to `{value}`")]
    ParameterValue { name: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("config error: {0:?}")]
    Config(ConfigError),

    #[error("failed to record model: {0:?}")]
    Record(RecorderError),

    #[cfg(feature = "plot")]
    #[error("failed to draw plot: {0}")]
    Plot(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<RecorderError> for Error {
    fn from(err: RecorderError) -> Self {
        Self::Record(err)
    }
}

#[cfg(feature = "plot")]
impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>> for Error {
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Self::Plot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
