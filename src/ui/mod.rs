//! Full-screen terminal interface

pub mod conversation;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info};

use crate::config::Config;
use crate::events::{Backend, TuiEvent};
use conversation::{ConversationScreen, ScreenAction};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Run the chat screen for `backend` until the user quits.
pub async fn run(config: Config, backend: Backend) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &config, backend);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn event_loop(terminal: &mut Tui, config: &Config, backend: Backend) -> Result<()> {
    let mut screen = ConversationScreen::new(config, backend)?;
    let tick_rate = config.tick_rate();

    loop {
        screen.tick();
        terminal.draw(|frame| screen.render(frame))?;

        match next_event(tick_rate)? {
            TuiEvent::Key(key) => match screen.handle_key(key) {
                ScreenAction::None => {}
                ScreenAction::Exit => break,
                ScreenAction::SwitchBackend(target) => {
                    info!(from = screen.backend().route(), to = target.route(), "switching backend");
                    screen.switch_backend(config, target)?;
                }
            },
            TuiEvent::Paste(text) => screen.handle_paste(&text),
            TuiEvent::Resize(width, height) => debug!(width, height, "terminal resized"),
            TuiEvent::Tick => {}
        }
    }

    Ok(())
}

/// Wait up to `timeout` for terminal input. Spawned gateway calls keep running
/// on the other runtime workers meanwhile.
fn next_event(timeout: Duration) -> Result<TuiEvent> {
    tokio::task::block_in_place(|| {
        if !event::poll(timeout)? {
            return Ok(TuiEvent::Tick);
        }
        let event = match event::read()? {
            Event::Key(key) => TuiEvent::Key(key),
            Event::Paste(text) => TuiEvent::Paste(text),
            Event::Resize(width, height) => TuiEvent::Resize(width, height),
            _ => TuiEvent::Tick,
        };
        Ok(event)
    })
}
