//! tmux session discovery: shells out to `tmux list-sessions` with a
//! pipe-delimited format string and parses stdout line by line.

use std::process::Command;

use crate::error::SessionError;

#[derive(Debug, Clone)]
pub struct TmuxSession {
    pub name: String,
    pub windows: u32,
    pub attached: bool,
    pub created: String,
}

/// List currently running tmux sessions. An empty list (not an error) is
/// returned when tmux has no sessions; `Err` only for a spawn failure.
pub fn list_sessions() -> Result<Vec<TmuxSession>, SessionError> {
    let output = Command::new("tmux")
        .arg("list-sessions")
        .arg("-F")
        .arg("#{session_name}|#{session_windows}|#{session_attached}|#{session_created}")
        .output()
        .map_err(SessionError::Spawn)?;

    if !output.status.success() {
        return Ok(Vec::new());
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let sessions: Vec<TmuxSession> = text.lines().filter_map(parse_line).collect();

    Ok(sessions)
}

fn parse_line(line: &str) -> Option<TmuxSession> {
    let mut fields = line.splitn(4, '|');
    let name = fields.next()?.to_string();
    if name.is_empty() {
        return None;
    }
    let windows = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let attached = fields.next().map(|f| f != "0").unwrap_or(false);
    let created = fields.next().unwrap_or_default().to_string();

    Some(TmuxSession {
        name,
        windows,
        attached,
        created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let s = parse_line("dev|3|1|Sat Jul 25 10:00:00 2026").unwrap();
        assert_eq!(s.name, "dev");
        assert_eq!(s.windows, 3);
        assert!(s.attached);
        assert_eq!(s.created, "Sat Jul 25 10:00:00 2026");
    }

    #[test]
    fn short_line_fills_defaults_instead_of_panicking() {
        let s = parse_line("dev").unwrap();
        assert_eq!(s.name, "dev");
        assert_eq!(s.windows, 0);
        assert!(!s.attached);
        assert_eq!(s.created, "");
    }

    #[test]
    fn empty_name_is_skipped() {
        assert!(parse_line("|1|0|now").is_none());
    }
}
