use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    algo::Algorithm,
    error::{Error, Result},
};

/// Smooth a series with a uniform window, keeping only fully covered positions
///
/// The output has `values.len() - window + 1` entries and is empty when the window is longer
/// than the series.
pub fn moving_average(values: &[f32], window: usize) -> Result<Vec<f32>> {
    if window == 0 {
        return Err(Error::InvalidHyperparameter {
            name: "window",
            value: 0.0,
            reason: "must be greater than zero",
        });
    }
    Ok(values
        .windows(window)
        .map(|w| (w.iter().map(|&x| x as f64).sum::<f64>() / window as f64) as f32)
        .collect())
}

/// Mean and population standard deviation of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f32,
    pub std: f32,
}

impl Stats {
    pub fn from_samples(samples: &[f32]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptySeries("samples"));
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Ok(Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
        })
    }
}

/// Relative gain of Double DQN over DQN in percent, undefined when the DQN mean is zero
pub fn improvement_percent(dqn_mean: f32, ddqn_mean: f32) -> Option<f32> {
    (dqn_mean != 0.0).then(|| (ddqn_mean - dqn_mean) / dqn_mean.abs() * 100.0)
}

/// Everything recorded about one trained agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgoResult {
    pub mean: f32,
    pub std: f32,
    /// Evaluation reward of each greedy episode
    pub rewards: Vec<f32>,
    pub training_rewards: Vec<f32>,
    pub losses: Vec<f32>,
}

/// Results of every run, keyed by environment name and then algorithm name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results(pub BTreeMap<String, BTreeMap<String, AlgoResult>>);

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result, replacing any earlier one for the same pair
    pub fn insert(&mut self, env: impl Into<String>, algo: impl Into<String>, result: AlgoResult) {
        self.0
            .entry(env.into())
            .or_default()
            .insert(algo.into(), result);
    }

    pub fn get(&self, env: &str, algo: &str) -> Option<&AlgoResult> {
        self.0.get(env)?.get(algo)
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Add every result of `other`, which wins on conflicts
    pub fn merge(&mut self, other: Results) {
        for (env, algos) in other.0 {
            for (algo, result) in algos {
                self.insert(env.clone(), algo, result);
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Evaluation rewards of one algorithm on one environment for each tried value of a
/// hyperparameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub env: String,
    pub algorithm: String,
    pub param: String,
    /// Evaluation rewards keyed by the parameter value as written on the command line
    pub runs: BTreeMap<String, Vec<f32>>,
}

impl Sweep {
    pub fn new(env: impl Into<String>, algorithm: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            algorithm: algorithm.into(),
            param: param.into(),
            runs: BTreeMap::new(),
        }
    }

    /// File name of the recorded sweep, e.g. `CartPole-v1_gamma_sweep.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}_sweep.json", self.env, self.param)
    }

    /// Runs ordered by parameter value, numerically when every value parses as a number
    pub fn sorted_runs(&self) -> Vec<(String, Vec<f32>)> {
        let mut runs = self
            .runs
            .iter()
            .map(|(value, rewards)| (value.clone(), rewards.clone()))
            .collect::<Vec<_>>();
        let numeric = runs
            .iter()
            .map(|(value, _)| value.parse::<f64>().ok())
            .collect::<Option<Vec<_>>>();
        if let Some(keys) = numeric {
            let mut keyed = keys.into_iter().zip(runs).collect::<Vec<_>>();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            runs = keyed.into_iter().map(|(_, run)| run).collect();
        }
        runs
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// A LaTeX table comparing the evaluation of both algorithms on each environment
///
/// Only environments with both a DQN and a DDQN result appear.
pub fn summary_table(results: &Results) -> String {
    let (dqn, ddqn) = (Algorithm::Dqn.as_ref(), Algorithm::DoubleDqn.as_ref());
    let mut lines = [
        r"\begin{table}[h]",
        r"\centering",
        r"\begin{tabular}{|l|c|c|c|}",
        r"\hline",
        r"\textbf{Environment} & \textbf{DQN} & \textbf{DDQN} & \textbf{Improvement} \\",
        r"\hline",
    ]
    .map(String::from)
    .to_vec();

    for (env, algos) in &results.0 {
        let (Some(a), Some(b)) = (algos.get(dqn), algos.get(ddqn)) else {
            continue;
        };
        let improvement = match improvement_percent(a.mean, b.mean) {
            Some(p) => format!("{p:+.1}\\%"),
            None => String::from("--"),
        };
        lines.push(format!(
            "{env} & ${:.1} \\pm {:.1}$ & ${:.1} \\pm {:.1}$ & {improvement} \\\\",
            a.mean, a.std, b.mean, b.std
        ));
    }

    lines.extend(
        [
            r"\hline",
            r"\end{tabular}",
            r"\caption{Performance Comparison: DQN vs DDQN (Mean $\pm$ Std over 100 episodes)}",
            r"\label{tab:results}",
            r"\end{table}",
        ]
        .map(String::from),
    );
    let mut table = lines.join("\n");
    table.push('\n');
    table
}

pub fn write_summary_table(results: &Results, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, summary_table(results))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use statrs::statistics::Statistics;

    use super::*;

    fn result(mean: f32, std: f32) -> AlgoResult {
        AlgoResult {
            mean,
            std,
            rewards: vec![mean; 3],
            training_rewards: vec![1.0, 2.0, 3.0],
            losses: vec![0.5, 0.25],
        }
    }

    #[test]
    fn moving_average_valid_mode() {
        let smoothed = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(smoothed, vec![2.0, 3.0, 4.0], "only full windows kept");
        assert!(moving_average(&[1.0, 2.0], 3).unwrap().is_empty(), "window longer than input");
        assert_eq!(moving_average(&[7.0], 1).unwrap(), vec![7.0]);
        assert!(moving_average(&[1.0], 0).is_err(), "zero window rejected");
    }

    #[test]
    fn stats_match_statrs() {
        let samples = [500.0f32, 480.0, 210.5, 499.0, 13.25];
        let stats = Stats::from_samples(&samples).unwrap();
        let xs = samples.iter().map(|&x| x as f64).collect::<Vec<_>>();
        let mean = xs.iter().mean();
        let std = xs.iter().population_std_dev();
        assert!((stats.mean as f64 - mean).abs() < 1e-3, "mean");
        assert!((stats.std as f64 - std).abs() < 1e-3, "population std");
        assert!(Stats::from_samples(&[]).is_err(), "empty sample rejected");
    }

    #[test]
    fn improvement() {
        assert_eq!(improvement_percent(200.0, 300.0), Some(50.0));
        assert_eq!(improvement_percent(-200.0, -100.0), Some(50.0), "less negative is better");
        assert_eq!(improvement_percent(0.0, 10.0), None);
    }

    #[test]
    fn results_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut results = Results::new();
        results.insert("CartPole-v1", "DQN", result(200.0, 10.0));
        results.insert("CartPole-v1", "DDQN", result(300.0, 5.0));
        results.save(&path).unwrap();

        let loaded = Results::load(&path).unwrap();
        assert_eq!(loaded, results);
        assert_eq!(loaded.get("CartPole-v1", "DDQN").unwrap().mean, 300.0);
        assert!(loaded.get("Acrobot-v1", "DQN").is_none());
    }

    #[test]
    fn merge_overwrites() {
        let mut results = Results::new();
        results.insert("CartPole-v1", "DQN", result(1.0, 0.0));
        let mut other = Results::new();
        other.insert("CartPole-v1", "DQN", result(2.0, 0.0));
        other.insert("Acrobot-v1", "DDQN", result(-90.0, 4.0));
        results.merge(other);
        assert_eq!(results.get("CartPole-v1", "DQN").unwrap().mean, 2.0);
        assert_eq!(results.environments().collect::<Vec<_>>(), ["Acrobot-v1", "CartPole-v1"]);
    }

    #[test]
    fn latex_table() {
        let mut results = Results::new();
        results.insert("CartPole-v1", "DQN", result(200.0, 10.0));
        results.insert("CartPole-v1", "DDQN", result(300.0, 5.5));
        results.insert("Acrobot-v1", "DQN", result(-100.0, 1.0));

        let table = summary_table(&results);
        assert!(table.contains(r"\label{tab:results}"));
        assert!(table.contains(r"\begin{tabular}{|l|c|c|c|}"));
        assert!(table.contains("Mean $\\pm$ Std over 100 episodes"));
        assert!(
            table.contains(r"CartPole-v1 & $200.0 \pm 10.0$ & $300.0 \pm 5.5$ & +50.0\% \\"),
            "row formatted, got:\n{table}"
        );
        assert!(!table.contains("Acrobot-v1"), "incomplete pairs skipped");
    }

    #[test]
    fn sweep_sorted_by_value() {
        let mut sweep = Sweep::new("CartPole-v1", "DDQN", "batch_size");
        for value in ["128", "64", "1024", "32"] {
            sweep.runs.insert(value.into(), vec![value.len() as f32]);
        }
        let order = sweep
            .sorted_runs()
            .into_iter()
            .map(|(value, _)| value)
            .collect::<Vec<_>>();
        assert_eq!(order, ["32", "64", "128", "1024"], "numeric, not lexicographic");

        let mut named = Sweep::new("Pendulum-v1", "DQN", "loss");
        named.runs.insert("Mse".into(), vec![1.0]);
        named.runs.insert("Huber".into(), vec![2.0]);
        assert_eq!(named.sorted_runs()[0].0, "Huber", "non-numeric values sorted by name");
    }

    #[test]
    fn sweep_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut sweep = Sweep::new("Acrobot-v1", "DQN", "gamma");
        sweep.runs.insert("0.9".into(), vec![-120.0, -100.0]);
        assert_eq!(sweep.file_name(), "Acrobot-v1_gamma_sweep.json");

        let path = dir.path().join(sweep.file_name());
        sweep.save(&path).unwrap();
        assert_eq!(Sweep::load(&path).unwrap(), sweep);
    }
}
