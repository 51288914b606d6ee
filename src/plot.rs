use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use plotters::{
    backend::BitMapBackend,
    chart::ChartBuilder,
    coord::combinators::IntoLogRange,
    drawing::IntoDrawingArea,
    element::{ErrorBar, PathElement, Rectangle, Text},
    series::LineSeries,
    style::{Color, IntoFont, RGBColor, BLACK, RED, WHITE},
};

use crate::{
    algo::Algorithm,
    analysis::{moving_average, Results, Stats, Sweep},
    error::Result,
};

const BLUE: RGBColor = RGBColor(31, 119, 180);
const ORANGE: RGBColor = RGBColor(255, 127, 14);
const GREEN: RGBColor = RGBColor(44, 160, 44);
const CRIMSON: RGBColor = RGBColor(214, 39, 40);

const FONT: &str = "sans-serif";

fn output(dir: &Path, name: String) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(name))
}

/// Padded bounds covering every value
fn bounds(values: impl IntoIterator<Item = f32>) -> Range<f32> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad)..(hi + pad)
}

fn indexed(values: &[f32], offset: usize) -> impl Iterator<Item = (f32, f32)> + '_ {
    values
        .iter()
        .enumerate()
        .map(move |(i, &v)| ((i + offset) as f32, v))
}

/// Raw and smoothed training rewards of both algorithms on one environment
///
/// Writes `{env}_training_comparison.png`.
pub fn training_comparison(
    dqn_rewards: &[f32],
    ddqn_rewards: &[f32],
    env: &str,
    window: usize,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = output(dir.as_ref(), format!("{env}_training_comparison.png"))?;
    {
        let root = BitMapBackend::new(&path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let episodes = dqn_rewards.len().max(ddqn_rewards.len()).max(1) as f32;
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Training Curves: {env}"), (FONT, 32).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..episodes, bounds(dqn_rewards.iter().chain(ddqn_rewards).copied()))?;
        chart
            .configure_mesh()
            .x_desc("Episode")
            .y_desc("Reward")
            .draw()?;

        for (name, rewards, color) in [
            (Algorithm::Dqn, dqn_rewards, BLUE),
            (Algorithm::DoubleDqn, ddqn_rewards, ORANGE),
        ] {
            chart
                .draw_series(LineSeries::new(indexed(rewards, 0), color.mix(0.3)))?
                .label(format!("{name} (raw)"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.mix(0.3)));

            let smoothed = moving_average(rewards, window)?;
            chart
                .draw_series(LineSeries::new(
                    indexed(&smoothed, window.saturating_sub(1)),
                    color.stroke_width(2),
                ))?
                .label(format!("{name} (smoothed)"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        root.present()?;
    }
    Ok(path)
}

/// Evaluation rewards with their mean and ±1 std band, next to a histogram of the rewards
///
/// Writes `{env}_{algo}_stability.png`.
pub fn evaluation_stability(
    rewards: &[f32],
    env: &str,
    algo: &str,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let stats = Stats::from_samples(rewards)?;
    let path = output(dir.as_ref(), format!("{env}_{algo}_stability.png"))?;
    {
        let root = BitMapBackend::new(&path, (1400, 500)).into_drawing_area();
        root.fill(&WHITE)?;
        let (left, right) = root.split_horizontally(700);

        let n = rewards.len() as f32;
        let (low, high) = (stats.mean - stats.std, stats.mean + stats.std);
        let mut chart = ChartBuilder::on(&left)
            .caption(format!("{algo} Stability: {env}"), (FONT, 26).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..n - 0.5, bounds(rewards.iter().copied().chain([low, high])))?;
        chart
            .configure_mesh()
            .x_desc("Test Episode")
            .y_desc("Reward")
            .draw()?;

        chart
            .draw_series([Rectangle::new([(-0.5, low), (n - 0.5, high)], RED.mix(0.2).filled())])?
            .label(format!("±1 Std: {:.2}", stats.std))
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], RED.mix(0.2).filled()));
        chart
            .draw_series(LineSeries::new(indexed(rewards, 0), BLUE).point_size(3))?
            .label("Reward")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
        chart
            .draw_series(LineSeries::new([(-0.5, stats.mean), (n - 0.5, stats.mean)], RED))?
            .label(format!("Mean: {:.2}", stats.mean))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        let bins = histogram(rewards, 20);
        let x_range = bounds(rewards.iter().copied());
        let max_count = bins.iter().map(|&(_, _, c)| c).max().unwrap_or(1) as f32;
        let mut hist = ChartBuilder::on(&right)
            .caption("Reward Distribution", (FONT, 26).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, 0.0..max_count * 1.1)?;
        hist.configure_mesh()
            .x_desc("Reward")
            .y_desc("Frequency")
            .draw()?;
        hist.draw_series(bins.iter().map(|&(x0, x1, count)| {
            Rectangle::new([(x0, 0.0), (x1, count as f32)], ORANGE.mix(0.7).filled())
        }))?;
        hist.draw_series(bins.iter().map(|&(x0, x1, count)| {
            Rectangle::new([(x0, 0.0), (x1, count as f32)], BLACK)
        }))?;
        hist.draw_series(LineSeries::new(
            [(stats.mean, 0.0), (stats.mean, max_count * 1.1)],
            RED.stroke_width(2),
        ))?;

        root.present()?;
    }
    Ok(path)
}

/// Equal width bins over the range of `values` as `(start, end, count)`
fn histogram(values: &[f32], bins: usize) -> Vec<(f32, f32, usize)> {
    let lo = values.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f32;
    let mut counts = vec![0; bins];
    for &v in values {
        let ix = (((v - lo) / width) as usize).min(bins - 1);
        counts[ix] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (lo + width * i as f32, lo + width * (i + 1) as f32, c))
        .collect()
}

/// Per-episode loss on a log scale, smoothed once there are more points than `window`
///
/// Writes `{env}_{algo}_loss.png`.
pub fn loss_curve(
    losses: &[f32],
    env: &str,
    algo: &str,
    window: usize,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = output(dir.as_ref(), format!("{env}_{algo}_loss.png"))?;
    {
        let root = BitMapBackend::new(&path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let positive = || losses.iter().copied().filter(|&l| l > 0.0);
        let lo = positive().fold(f32::INFINITY, f32::min);
        let hi = positive().fold(f32::NEG_INFINITY, f32::max);
        let (lo, hi) = if lo <= hi { (lo * 0.8, hi * 1.25) } else { (1e-3, 1.0) };

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{algo} Training Loss: {env}"), (FONT, 32).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0.0..losses.len().max(1) as f32, (lo..hi).log_scale())?;
        chart
            .configure_mesh()
            .x_desc("Episode")
            .y_desc("Loss")
            .draw()?;

        let points = |values: &[f32], offset: usize| {
            indexed(values, offset)
                .filter(|&(_, l)| l > 0.0)
                .collect::<Vec<_>>()
        };
        if losses.len() > window {
            chart
                .draw_series(LineSeries::new(points(losses, 0), CRIMSON.mix(0.3)))?
                .label("Loss (raw)")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CRIMSON.mix(0.3)));
            let smoothed = moving_average(losses, window)?;
            chart
                .draw_series(LineSeries::new(
                    points(&smoothed, window - 1),
                    CRIMSON.stroke_width(2),
                ))?
                .label("Loss (smoothed)")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CRIMSON.stroke_width(2)));
        } else {
            chart
                .draw_series(LineSeries::new(points(losses, 0), CRIMSON.stroke_width(2)))?
                .label("Loss")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CRIMSON.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        root.present()?;
    }
    Ok(path)
}

/// Label formatter for categorical axes drawn over integer positions
fn category<'a>(names: &'a [String]) -> impl Fn(&f32) -> String + 'a {
    move |x| {
        let ix = x.round();
        if (x - ix).abs() > 1e-3 || ix < 0.0 {
            return String::new();
        }
        names.get(ix as usize).cloned().unwrap_or_default()
    }
}

/// Grouped bars of the evaluation mean with ±1 std error bars for every environment
///
/// Environments missing either algorithm are left out. Writes `all_environments_comparison.png`.
pub fn all_environments_comparison(results: &Results, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let (dqn, ddqn) = (Algorithm::Dqn.as_ref(), Algorithm::DoubleDqn.as_ref());
    let rows = results
        .0
        .iter()
        .filter_map(|(env, algos)| Some((env.clone(), algos.get(dqn)?, algos.get(ddqn)?)))
        .collect::<Vec<_>>();
    let names = rows.iter().map(|(env, ..)| env.clone()).collect::<Vec<_>>();

    let path = output(dir.as_ref(), String::from("all_environments_comparison.png"))?;
    {
        let root = BitMapBackend::new(&path, (1200, 700)).into_drawing_area();
        root.fill(&WHITE)?;

        let y_range = bounds(rows.iter().flat_map(|(_, a, b)| {
            [0.0, a.mean - a.std, a.mean + a.std, b.mean - b.std, b.mean + b.std]
        }));
        let formatter = category(&names);
        let mut chart = ChartBuilder::on(&root)
            .caption("DQN vs DDQN Performance Comparison", (FONT, 32).into_font())
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5..rows.len().max(1) as f32 - 0.5, y_range)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(rows.len() + 1)
            .x_label_formatter(&formatter)
            .x_desc("Environment")
            .y_desc("Average Reward (100 episodes)")
            .draw()?;

        const WIDTH: f32 = 0.35;
        for (offset, label, color, pick) in [
            (-WIDTH / 2.0, dqn, BLUE, 0usize),
            (WIDTH / 2.0, ddqn, ORANGE, 1),
        ] {
            let bars = rows
                .iter()
                .enumerate()
                .map(|(i, (_, a, b))| {
                    let r = if pick == 0 { a } else { b };
                    (i as f32 + offset, r.mean, r.std)
                })
                .collect::<Vec<_>>();

            chart
                .draw_series(bars.iter().map(|&(x, mean, _)| {
                    Rectangle::new(
                        [(x - WIDTH / 2.0, 0.0), (x + WIDTH / 2.0, mean)],
                        color.mix(0.8).filled(),
                    )
                }))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
            chart.draw_series(bars.iter().map(|&(x, mean, std)| {
                ErrorBar::new_vertical(x, mean - std, mean, mean + std, BLACK.filled(), 10)
            }))?;
            chart.draw_series(bars.iter().map(|&(x, mean, _)| {
                Text::new(format!("{mean:.1}"), (x - WIDTH / 4.0, mean), (FONT, 14).into_font())
            }))?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        root.present()?;
    }
    Ok(path)
}

/// One bar per hyperparameter value with the mean and ±1 std of its evaluation rewards
///
/// Bars are ordered by parameter value. Writes `{env}_{param}_comparison.png`.
pub fn hyperparameter_comparison(sweep: &Sweep, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let (env, param) = (&sweep.env, &sweep.param);
    let bars = sweep
        .sorted_runs()
        .into_iter()
        .map(|(value, rewards)| Ok((value, Stats::from_samples(&rewards)?)))
        .collect::<Result<Vec<_>>>()?;
    let names = bars.iter().map(|(v, _)| v.clone()).collect::<Vec<_>>();

    let path = output(dir.as_ref(), format!("{env}_{param}_comparison.png"))?;
    {
        let root = BitMapBackend::new(&path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let y_range = bounds(
            bars.iter()
                .flat_map(|(_, s)| [0.0, s.mean - s.std, s.mean + s.std]),
        );
        let formatter = category(&names);
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Effect of {param} on {env} ({})", sweep.algorithm), (FONT, 32).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5..bars.len().max(1) as f32 - 0.5, y_range)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(bars.len() + 1)
            .x_label_formatter(&formatter)
            .x_desc(param)
            .y_desc("Average Reward")
            .draw()?;

        chart.draw_series(bars.iter().enumerate().map(|(i, (_, s))| {
            let x = i as f32;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, s.mean)], GREEN.mix(0.7).filled())
        }))?;
        chart.draw_series(bars.iter().enumerate().map(|(i, (_, s))| {
            ErrorBar::new_vertical(i as f32, s.mean - s.std, s.mean, s.mean + s.std, BLACK.filled(), 10)
        }))?;

        root.present()?;
    }
    Ok(path)
}

/// Render every chart the results allow into `dir`
///
/// **Returns** the written files
pub fn all(results: &Results, window: usize, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let (dqn, ddqn) = (Algorithm::Dqn.as_ref(), Algorithm::DoubleDqn.as_ref());
    let mut written = Vec::new();

    for (env, algos) in &results.0 {
        if let (Some(a), Some(b)) = (algos.get(dqn), algos.get(ddqn)) {
            written.push(training_comparison(
                &a.training_rewards,
                &b.training_rewards,
                env,
                window,
                dir,
            )?);
        }
        for (algo, result) in algos {
            if !result.rewards.is_empty() {
                written.push(evaluation_stability(&result.rewards, env, algo, dir)?);
            }
            if !result.losses.is_empty() {
                written.push(loss_curve(&result.losses, env, algo, window, dir)?);
            }
        }
    }
    written.push(all_environments_comparison(results, dir)?);

    Ok(written)
}
