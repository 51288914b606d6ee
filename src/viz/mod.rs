//! Terminal dashboard for following a training run
//!
//! ```ignore
//! let (handle, tx) = viz::init(&viz::METRICS, config.num_episodes);
//! train_and_evaluate::<B>(env, &config, device, out, |episode, stats| {
//!     match tx.send(viz::Update::from_stats(episode, stats)) {
//!         Ok(()) => ControlFlow::Continue(()),
//!         Err(_) => ControlFlow::Break(()),
//!     }
//! })?;
//! drop(tx);
//! handle.join().ok();
//! ```

use std::{
    io,
    sync::mpsc::{self, Sender},
    thread::{self, JoinHandle},
};

use crate::algo::EpisodeStats;

mod app;
mod components;
mod tui;
mod util;

pub use app::App;

/// Metrics plotted for every episode, in the order of [`Update::data`]
pub const METRICS: [&str; 4] = ["reward", "steps", "loss", "epsilon"];

/// Format for updating plot data
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub episode: usize,
    /// One value per plot, non-finite values are not drawn
    pub data: Vec<f64>,
}

impl Update {
    /// An update carrying [`METRICS`]
    pub fn from_stats(episode: usize, stats: &EpisodeStats) -> Self {
        Self {
            episode,
            data: vec![
                stats.reward.into(),
                stats.steps as f64,
                stats.mean_loss.map_or(f64::NAN, f64::from),
                stats.epsilon.into(),
            ],
        }
    }
}

/// Route logs to the dashboard and start it on its own thread
///
/// The dashboard runs until the user quits, which drops the receiver so further sends fail.
/// Logging can only be initialized once per process, a failed attempt is ignored.
pub fn init(
    metrics: &[&'static str],
    episodes: usize,
) -> (JoinHandle<io::Result<()>>, Sender<Update>) {
    let _ = tui_logger::init_logger(log::LevelFilter::Trace);
    tui_logger::set_default_level(log::LevelFilter::Info);

    let (tx, rx) = mpsc::channel();
    let mut app = App::new(metrics, episodes);
    let handle = thread::spawn(move || app.run(rx));

    (handle, tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_from_stats() {
        let stats = EpisodeStats {
            reward: 21.0,
            steps: 21,
            mean_loss: None,
            epsilon: 0.5,
        };
        let update = Update::from_stats(3, &stats);
        assert_eq!(update.episode, 3);
        assert_eq!(update.data.len(), METRICS.len());
        assert_eq!(update.data[0], 21.0);
        assert!(update.data[2].is_nan(), "missing loss is not drawn");
    }
}
