//! Interactive session picker: a boxed list with arrow/vim navigation and
//! number shortcuts, driven by `crossterm` raw mode with an RAII guard
//! that restores the terminal on every exit path, including panics.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::error::ServerError;
use crate::session::TmuxSession;

const MAX_VISIBLE: usize = 15;

/// Restores raw mode on drop, including on panic unwind.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        print!("\x1b[?25l"); // hide cursor
        let _ = io::stdout().flush();
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        print!("\x1b[?25h"); // show cursor
        let _ = io::stdout().flush();
    }
}

/// Present the session list and block until the user selects one, cancels,
/// or an error occurs. A single-session list is auto-selected without
/// entering raw mode.
pub fn select_interactive(sessions: &[TmuxSession]) -> Result<String, ServerError> {
    if sessions.is_empty() {
        return Err(ServerError::NoSessions);
    }
    if sessions.len() == 1 {
        return Ok(sessions[0].name.clone());
    }

    let _guard = RawModeGuard::enter().map_err(|_| ServerError::SelectionCancelled)?;
    let visible = sessions.len().min(MAX_VISIBLE);
    let mut selected = 0usize;

    render(sessions, selected);

    loop {
        let Event::Key(key) = event::read().map_err(|_| ServerError::SelectionCancelled)? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                return Err(ServerError::SelectionCancelled);
            }
            KeyCode::Enter => return Ok(sessions[selected].name.clone()),
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
                selected = (selected + visible - 1) % visible;
                render(sessions, selected);
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
                selected = (selected + 1) % visible;
                render(sessions, selected);
            }
            KeyCode::Char(c @ '1'..='9') => {
                let idx = (c as u8 - b'1') as usize;
                if idx < sessions.len() {
                    return Ok(sessions[idx].name.clone());
                }
            }
            _ => {}
        }
    }
}

fn render(sessions: &[TmuxSession], selected: usize) {
    print!("\x1b[2J\x1b[H");
    println!("  webmux - tmux session selector");
    println!("  ────────────────────────────────────────");
    for (i, s) in sessions.iter().take(MAX_VISIBLE).enumerate() {
        let marker = if i == selected { "▶" } else { " " };
        let attached = if s.attached { "●" } else { "○" };
        println!("  {marker} {:<20} {:>3} win  {attached}", s.name, s.windows);
    }
    if sessions.len() > MAX_VISIBLE {
        println!("  ... and {} more", sessions.len() - MAX_VISIBLE);
    }
    println!("  ────────────────────────────────────────");
    println!("  ↑↓/jk navigate   Enter select   q quit");
    let _ = io::stdout().flush();
}
