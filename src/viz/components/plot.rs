use crossterm::event::{Event, KeyCode};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, BorderType, Chart, Dataset, GraphType, Padding, Tabs, WidgetRef},
};

use super::Component;
use crate::viz::{util::event_keycode, Update};

/// A scatter plot of one metric against the episode
pub struct Plot {
    title: &'static str,
    x_bounds: [f64; 2],
    /// `None` until the first finite point arrives
    y_bounds: Option<[f64; 2]>,
    data: Vec<(f64, f64)>,
}

impl Plot {
    pub fn new(title: &'static str, episodes: usize) -> Self {
        Self {
            title,
            x_bounds: [0.0, episodes.max(1) as f64],
            y_bounds: None,
            data: Vec::new(),
        }
    }

    /// Add a point, skipping non-finite values
    pub fn update(&mut self, point: (f64, f64)) {
        if !point.1.is_finite() {
            return;
        }
        self.x_bounds[1] = self.x_bounds[1].max(point.0);
        self.y_bounds = Some(match self.y_bounds {
            Some([lo, hi]) => [lo.min(point.1), hi.max(point.1)],
            None => [point.1, point.1],
        });
        self.data.push(point);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Y bounds widened so a flat series is still visible
    fn y_bounds(&self) -> [f64; 2] {
        match self.y_bounds {
            Some([lo, hi]) if hi > lo => [lo, hi],
            Some([v, _]) => [v - 1.0, v + 1.0],
            None => [0.0, 1.0],
        }
    }
}

fn labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .into_iter()
        .map(|x| format!("{x:.2}").bold())
        .collect()
}

impl WidgetRef for Plot {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Scatter)
            .cyan()
            .data(&self.data);

        let x_axis = Axis::default()
            .title("episode")
            .dark_gray()
            .labels(labels(self.x_bounds))
            .bounds(self.x_bounds);

        let y_bounds = self.y_bounds();
        let y_axis = Axis::default()
            .title(self.title)
            .dark_gray()
            .labels(labels(y_bounds))
            .bounds(y_bounds);

        Chart::new(vec![dataset])
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .padding(Padding::uniform(2)),
            )
            .x_axis(x_axis)
            .y_axis(y_axis)
            .render(area, buf);
    }
}

/// One [`Plot`] per metric, with a tab bar to pick the visible one
pub struct Plots {
    names: Vec<&'static str>,
    plots: Vec<Plot>,
    selected: usize,
}

impl Plots {
    pub fn new(names: Vec<&'static str>, episodes: usize) -> Self {
        let plots = names.iter().map(|&name| Plot::new(name, episodes)).collect();
        Self {
            names,
            plots,
            selected: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn next_plot(&mut self) {
        if !self.is_empty() {
            self.selected = (self.selected + 1) % self.len();
        }
    }

    pub fn prev_plot(&mut self) {
        if !self.is_empty() {
            self.selected = (self.selected + self.len() - 1) % self.len();
        }
    }

    /// Values beyond the number of plots are dropped
    pub fn update(&mut self, update: Update) {
        let Update { episode, data } = update;
        for (plot, value) in self.plots.iter_mut().zip(data) {
            plot.update((episode as f64, value));
        }
    }
}

impl WidgetRef for Plots {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let [tabs_area, plot_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);

        Tabs::new(self.names.iter().copied())
            .white()
            .highlight_style(Style::default().light_green())
            .select(self.selected)
            .render(tabs_area, buf);

        if let Some(plot) = self.plots.get(self.selected) {
            plot.render_ref(plot_area, buf);
        }
    }
}

impl Component for Plots {
    fn handle_ui_event(&mut self, event: &Event) -> bool {
        match event_keycode(event) {
            Some(KeyCode::Left) => self.prev_plot(),
            Some(KeyCode::Right) => self.next_plot(),
            _ => return false,
        }
        true
    }
}
