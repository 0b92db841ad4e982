pub mod render;
pub mod state;

use crate::store::Store;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use state::DashboardState;
use std::io::stdout;
use std::time::{Duration, Instant};

/// Run the statistics dashboard until the user quits.
pub fn run_dashboard(
    store: &Store,
    overall_followers: Option<u64>,
    refresh: Duration,
) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = dashboard_loop(&mut terminal, store, overall_followers, refresh);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    store: &Store,
    overall_followers: Option<u64>,
    refresh: Duration,
) -> Result<()> {
    let mut state = DashboardState::new(overall_followers);
    let mut last_refresh: Option<Instant> = None;

    loop {
        if last_refresh.is_none_or(|t| t.elapsed() >= refresh) {
            state.refresh(store);
            last_refresh = Some(Instant::now());
        }
        terminal.draw(|f| render::draw(f, &state))?;

        // Poll for keyboard events with 200ms timeout
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('r') => last_refresh = None,
                        _ => {}
                    }
                }
            }
        }
    }
}
