use ratatui::{prelude::*, widgets::*};

fn key_line(key: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::from(key).light_cyan().bold(),
        Span::raw(" : "),
        Span::raw(action),
    ])
}

/// Key bindings shown on every tab, followed by those of the selected tab
fn bindings(selected_tab: usize) -> Vec<Line<'static>> {
    let mut lines = vec![
        key_line("  q  ", "Stop training and exit"),
        key_line("  h  ", "Toggle this help"),
        key_line(" Tab ", "Switch tabs"),
    ];
    match selected_tab {
        0 => lines.push(key_line("⬅ / ➡", "Switch metric")),
        1 => lines.extend([
            key_line("  s  ", "Show or hide the target selector"),
            key_line("  f  ", "Focus on the selected target"),
            key_line("⬆ / ⬇", "Select log target"),
            key_line("⬅ / ➡", "Show one level less or more"),
            key_line("- / +", "Capture one level less or more"),
            key_line("PgUp ", "Scroll up through the history"),
            key_line("PgDn ", "Scroll down through the history"),
            key_line(" Esc ", "Leave page mode"),
            key_line("Space", "Hide targets that are turned off"),
        ]),
        _ => {}
    }
    lines
}

/// Draw the help popup centered over `area`
pub fn render_help(area: Rect, buf: &mut Buffer, selected_tab: usize) {
    let lines = bindings(selected_tab);

    let [_, center, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(lines.len() as u16 + 4),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(70),
        Constraint::Fill(1),
    ])
    .areas(center);

    Clear.render(center, buf);
    Paragraph::new(lines)
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .padding(Padding::proportional(1))
                .title("Help"),
        )
        .wrap(Wrap { trim: false })
        .render(center, buf);
}
