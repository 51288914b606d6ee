use std::{
    ops::ControlFlow,
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use burn::config::Config;
use clap::{Args, Parser, Subcommand};
use deepq::{
    algo::Algorithm,
    analysis::{write_summary_table, Results, Stats, Sweep},
    env::EnvId,
    train::{evaluate_saved, train_and_evaluate, RunResult},
    Error, Result, TrainingConfig,
};
use log::{info, warn};
use strum::IntoEnumIterator;

#[cfg(not(feature = "wgpu"))]
type Backend = burn::backend::Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type Backend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser, Debug)]
#[command(name = "deepq", version, about = "Train and compare DQN and Double DQN on classic control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train agents, save their models and record the results
    Train(TrainArgs),
    /// Run a saved model greedily
    Evaluate(EvaluateArgs),
    /// Train one agent per value of a hyperparameter and record the evaluations
    Sweep(SweepArgs),
    /// Write the LaTeX summary table and plots from recorded results
    Report(ReportArgs),
    /// Write the default training config as JSON
    Config {
        #[arg(long, default_value = "config.json")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Environment to train on, repeatable, or `all`
    #[arg(long, value_name = "ENV", default_value = "all")]
    env: Vec<String>,
    /// Algorithm to train, repeatable, defaults to both
    #[arg(long, value_name = "ALGO")]
    algo: Vec<String>,
    #[arg(long)]
    episodes: Option<usize>,
    /// JSON training config, see `deepq config`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for models and `results.json`
    #[arg(long, default_value = "results")]
    out: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
    /// Follow training in a terminal dashboard
    #[arg(long, default_value_t = false)]
    viz: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long)]
    env: String,
    #[arg(long)]
    algo: String,
    /// Model file written by `deepq train`
    #[arg(long)]
    model: PathBuf,
    #[arg(long)]
    episodes: Option<usize>,
    /// Config the model was trained with, for the network shape
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[arg(long)]
    env: String,
    #[arg(long, default_value = "DDQN")]
    algo: String,
    /// Hyperparameter to vary, e.g. `gamma`, `learning_rate`, `batch_size`, `tau`
    #[arg(long)]
    param: String,
    #[arg(long, num_args = 1.., required = true)]
    values: Vec<String>,
    #[arg(long)]
    episodes: Option<usize>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for models and the sweep record
    #[arg(long, default_value = "results")]
    out: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long, default_value = "results/results.json")]
    results: PathBuf,
    /// Sweep records written by `deepq sweep`, repeatable
    #[arg(long)]
    sweep: Vec<PathBuf>,
    #[arg(long, default_value = "results")]
    out: PathBuf,
    /// Moving average window of the training curves
    #[arg(long, default_value_t = 50)]
    window: usize,
}

fn load_config(path: Option<&PathBuf>) -> Result<TrainingConfig> {
    match path {
        Some(path) => Ok(TrainingConfig::load(path)?),
        None => Ok(TrainingConfig::new()),
    }
}

fn parse_env(name: &str) -> Result<EnvId> {
    EnvId::from_str(name).map_err(|_| Error::UnknownEnvironment(name.to_owned()))
}

fn parse_algo(name: &str) -> Result<Algorithm> {
    Algorithm::from_str(name).map_err(|_| Error::UnknownAlgorithm(name.to_owned()))
}

fn resolve_envs(names: &[String]) -> Result<Vec<EnvId>> {
    if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
        return Ok(EnvId::iter().collect());
    }
    names.iter().map(|n| parse_env(n)).collect()
}

fn resolve_algos(names: &[String]) -> Result<Vec<Algorithm>> {
    if names.is_empty() {
        return Ok(Algorithm::iter().collect());
    }
    names.iter().map(|n| parse_algo(n)).collect()
}

fn run(env: EnvId, config: &TrainingConfig, out: &Path, viz: bool) -> Result<RunResult> {
    let device = Default::default();
    if viz {
        #[cfg(feature = "viz")]
        {
            use deepq::viz;

            let (handle, tx) = viz::init(&viz::METRICS, config.num_episodes);
            let result =
                train_and_evaluate::<Backend>(env, config, device, out, |episode, stats| {
                    match tx.send(viz::Update::from_stats(episode, stats)) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    }
                });
            drop(tx);
            match handle.join() {
                Ok(Err(err)) => warn!("dashboard failed: {err}"),
                Err(_) => warn!("dashboard panicked"),
                Ok(Ok(())) => {}
            }
            return result;
        }
        #[cfg(not(feature = "viz"))]
        warn!("built without the `viz` feature, training without the dashboard");
    }
    train_and_evaluate::<Backend>(env, config, device, out, |_, _| ControlFlow::Continue(()))
}

/// The config file with the command line overrides applied
fn run_config(
    path: Option<&PathBuf>,
    episodes: Option<usize>,
    seed: Option<u64>,
) -> Result<TrainingConfig> {
    let mut config = load_config(path)?;
    if let Some(episodes) = episodes {
        config.num_episodes = episodes;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn train(args: TrainArgs) -> Result<()> {
    let config = run_config(args.config.as_ref(), args.episodes, args.seed)?;

    let envs = resolve_envs(&args.env)?;
    let algos = resolve_algos(&args.algo)?;

    std::fs::create_dir_all(&args.out)?;
    let results_path = args.out.join("results.json");
    let mut results = if results_path.exists() {
        Results::load(&results_path)?
    } else {
        Results::new()
    };

    'runs: for &env in &envs {
        for &algo in &algos {
            let config = config.clone().with_algorithm(algo);
            let result = run(env, &config, &args.out, args.viz)?;
            results.insert(env.as_ref(), algo.as_ref(), result.algo_result());
            results.save(&results_path)?;
            println!(
                "{algo} on {env}: {:.2} ± {:.2} over {} episodes",
                result.stats.mean,
                result.stats.std,
                result.eval_rewards.len()
            );
            if result.stopped {
                warn!("training stopped, skipping the remaining runs");
                break 'runs;
            }
        }
    }
    info!("results written to {}", results_path.display());

    Ok(())
}

fn sweep(args: SweepArgs) -> Result<()> {
    let env = parse_env(&args.env)?;
    let algo = parse_algo(&args.algo)?;
    let base = run_config(args.config.as_ref(), args.episodes, args.seed)?.with_algorithm(algo);

    let mut record = Sweep::new(env.as_ref(), algo.as_ref(), args.param.as_str());
    for value in &args.values {
        let config = base.clone().with_parameter(&args.param, value)?;
        config.validate()?;
        let out = args.out.join(format!("{}={value}", args.param));
        let result = run(env, &config, &out, false)?;
        println!(
            "{algo} on {env} with {}={value}: {:.2} ± {:.2}",
            args.param, result.stats.mean, result.stats.std
        );
        record.runs.insert(value.clone(), result.eval_rewards);
    }

    std::fs::create_dir_all(&args.out)?;
    let path = args.out.join(record.file_name());
    record.save(&path)?;
    println!("sweep written to {}", path.display());

    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let env = parse_env(&args.env)?;
    let algo = parse_algo(&args.algo)?;
    let mut config = load_config(args.config.as_ref())?.with_algorithm(algo);
    if let Some(episodes) = args.episodes {
        config.eval_episodes = episodes;
    }

    let rewards = evaluate_saved::<Backend>(env, &config, &args.model, Default::default())?;
    let stats = Stats::from_samples(&rewards)?;
    println!(
        "{algo} on {env}: {:.2} ± {:.2} over {} episodes",
        stats.mean,
        stats.std,
        rewards.len()
    );
    if let Some(threshold) = env.reward_threshold() {
        println!(
            "{} (threshold {threshold})",
            if stats.mean >= threshold { "solved" } else { "not solved" }
        );
    }

    Ok(())
}

fn report(args: ReportArgs) -> Result<()> {
    let results = Results::load(&args.results)?;
    std::fs::create_dir_all(&args.out)?;

    let table = args.out.join("summary_table.txt");
    write_summary_table(&results, &table)?;
    println!("LaTeX table saved to {}", table.display());

    let sweeps = args
        .sweep
        .iter()
        .map(Sweep::load)
        .collect::<Result<Vec<_>>>()?;

    #[cfg(feature = "plot")]
    {
        let dir = args.out.join("plots");
        let mut written = deepq::plot::all(&results, args.window, &dir)?;
        for sweep in &sweeps {
            written.push(deepq::plot::hyperparameter_comparison(sweep, &dir)?);
        }
        for path in written {
            println!("plot saved to {}", path.display());
        }
    }
    #[cfg(not(feature = "plot"))]
    {
        let _ = (args.window, sweeps);
        warn!("built without the `plot` feature, skipping plots");
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let dashboard = matches!(&cli.command, Command::Train(args) if args.viz && cfg!(feature = "viz"));
    if !dashboard {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let result = match cli.command {
        Command::Train(args) => train(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Sweep(args) => sweep(args),
        Command::Report(args) => report(args),
        Command::Config { out } => TrainingConfig::new()
            .save(&out)
            .map_err(Error::from)
            .map(|()| println!("default config written to {}", out.display())),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        TrainingConfig::new().with_gamma(0.95).save(&path).unwrap();

        let config = run_config(Some(&path), Some(40), Some(9)).unwrap();
        assert_eq!(config.gamma, 0.95, "read from the file");
        assert_eq!(config.num_episodes, 40);
        assert_eq!(config.seed, Some(9));
        assert_eq!(load_config(None).unwrap().seed, None, "defaults without a file");

        TrainingConfig::new().with_batch_size(0).save(&path).unwrap();
        assert!(run_config(Some(&path), None, None).is_err(), "validated after loading");
    }

    #[test]
    fn environment_and_algorithm_names() {
        assert_eq!(resolve_envs(&[]).unwrap().len(), 4);
        assert_eq!(resolve_envs(&[String::from("All")]).unwrap().len(), 4);
        assert_eq!(
            resolve_envs(&[String::from("Pendulum-v1")]).unwrap(),
            [EnvId::Pendulum]
        );
        assert!(resolve_envs(&[String::from("LunarLander-v2")]).is_err());
        assert_eq!(
            resolve_algos(&[]).unwrap(),
            [Algorithm::Dqn, Algorithm::DoubleDqn]
        );
        assert!(parse_algo("A2C").is_err());
    }

    #[test]
    fn sweep_arguments() {
        let cli = Cli::try_parse_from([
            "deepq", "sweep", "--env", "CartPole-v1", "--param", "gamma", "--values", "0.9", "0.99",
        ])
        .unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("sweep subcommand expected");
        };
        assert_eq!(args.values, ["0.9", "0.99"]);
        assert_eq!(args.algo, "DDQN", "Double DQN by default");
        assert!(Cli::try_parse_from(["deepq", "sweep", "--env", "CartPole-v1", "--param", "gamma"]).is_err());
    }
}
