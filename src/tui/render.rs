use super::state::DashboardState;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table,
    },
    Frame,
};

pub fn draw(f: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, state, chunks[0]);
    draw_stats(f, state, chunks[1]);
    draw_progress(f, state, chunks[2]);
    draw_scatter(f, state, chunks[3]);
    draw_status(f, state, chunks[4]);
    draw_footer(f, chunks[5]);
}

fn draw_header(f: &mut Frame, state: &DashboardState, area: Rect) {
    let refreshed = state.last_refresh.as_deref().unwrap_or("--:--:--");
    let line = Line::from(vec![
        Span::styled(
            " Follower Outreach ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | up "),
        Span::raw(state.uptime()),
        Span::raw(" | refreshed "),
        Span::styled(refreshed.to_string(), Style::default().fg(Color::DarkGray)),
    ]);
    let para = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(para, area);
}

fn draw_stats(f: &mut Frame, state: &DashboardState, area: Rect) {
    let s = &state.stats;
    let overall = s
        .overall_followers
        .map_or_else(|| "n/a".to_string(), |n| n.to_string());
    let rows = vec![
        ("Overall Followers", overall, Color::White),
        ("Fetched Followers", s.fetched_followers.to_string(), Color::White),
        ("Skipped Followers", s.skipped_followers.to_string(), Color::Red),
        ("DM Sent", s.dm_sent.to_string(), Color::Green),
        ("Retry DM Sent", s.retry_dm_sent.to_string(), Color::Yellow),
    ];

    let rows = rows.into_iter().map(|(label, value, color)| {
        Row::new(vec![
            Cell::from(label),
            Cell::from(value).style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ])
    });

    let table = Table::new(rows, [Constraint::Length(20), Constraint::Min(10)])
        .header(
            Row::new(vec!["Metric", "Count"])
                .style(Style::default().add_modifier(Modifier::UNDERLINED)),
        )
        .block(Block::default().title(" Statistics ").borders(Borders::ALL));
    f.render_widget(table, area);
}

fn draw_progress(f: &mut Frame, state: &DashboardState, area: Rect) {
    let ratio = state.fetched_ratio();
    let gauge = Gauge::default()
        .block(Block::default().title(" Fetched / Overall ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{:.1}%", ratio * 100.0));
    f.render_widget(gauge, area);
}

fn draw_scatter(f: &mut Frame, state: &DashboardState, area: Rect) {
    let sc = &state.scatter;
    let datasets = vec![
        Dataset::default()
            .name(format!("Verified ({} DMs)", sc.verified_dms))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&sc.verified),
        Dataset::default()
            .name(format!("Unverified ({} DMs)", sc.unverified_dms))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&sc.unverified),
    ];

    let labels = decade_labels(sc.bound);
    let axis_style = Style::default().fg(Color::DarkGray);
    let chart = Chart::new(datasets)
        .block(Block::default().title(" Followers vs Friends ").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("followers")
                .style(axis_style)
                .bounds([0.0, sc.bound])
                .labels(labels.clone()),
        )
        .y_axis(
            Axis::default()
                .title("friends")
                .style(axis_style)
                .bounds([0.0, sc.bound])
                .labels(labels),
        );
    f.render_widget(chart, area);
}

/// Axis labels for each whole decade up to `bound`: 1, 10, 100, 1k, ...
fn decade_labels(bound: f64) -> Vec<Span<'static>> {
    (0..=bound as u32)
        .map(|exp| {
            let label = match exp {
                0..=2 => 10u64.pow(exp).to_string(),
                3..=5 => format!("{}k", 10u64.pow(exp - 3)),
                _ => format!("{}M", 10u64.pow(exp.min(12) - 6)),
            };
            Span::raw(label)
        })
        .collect()
}

fn draw_status(f: &mut Frame, state: &DashboardState, area: Rect) {
    let line = match &state.error {
        Some(err) => {
            Line::from(Span::styled(format!(" {}", err), Style::default().fg(Color::Red)))
        }
        None => Line::from(Span::styled(" store OK", Style::default().fg(Color::Green))),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled("  [q]", Style::default().fg(Color::Yellow)),
        Span::raw("uit  "),
        Span::styled("[r]", Style::default().fg(Color::Yellow)),
        Span::raw("efresh  "),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
