use std::io;

/// Errors that can abort the whole process (bind/listen, CLI validation).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(i64),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),
    #[error("no tmux sessions available")]
    NoSessions,
    #[error("session selection cancelled")]
    SelectionCancelled,
}

/// Errors surfaced while spawning or driving a PTY child.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("openpty failed: {0}")]
    OpenPty(#[source] nix::Error),
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
    #[error("exec of tmux failed: {0}")]
    Exec(#[source] nix::Error),
    #[error("terminal is not running")]
    NotRunning,
}

/// Errors from tmux session discovery.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn tmux: {0}")]
    Spawn(#[source] io::Error),
    #[error("tmux reported no sessions")]
    Empty,
}
