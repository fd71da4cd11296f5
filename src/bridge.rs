//! The bridge loop: multiplexes readiness on the client socket and the PTY
//! master, decoding inbound frames into resize commands or raw keystrokes,
//! and forwarding PTY output as binary frames.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use serde::Deserialize;

use crate::pty::{PtyChild, ReadOutcome};
use crate::ws::{self, OpCode, ParseOutcome};

const PTY_READ_CHUNK: usize = 64 * 1024;
const POLL_TIMEOUT_MS: u16 = 50;
/// Backstop on the inbound buffer itself, on top of `ws::MAX_FRAME_PAYLOAD`
/// rejecting an oversized claimed length as soon as the header is parsed.
/// 14 bytes covers the largest possible frame header (2-byte base + 8-byte
/// extended length + 4-byte mask key).
const MAX_INBOUND_BUFFER: usize = ws::MAX_FRAME_PAYLOAD + 14;

/// Why a bridge loop stopped, logged once by `run` on the way out.
#[derive(Debug, Clone, Copy)]
enum ExitReason {
    Shutdown,
    PtyExited,
    PollFailed,
    SocketClosed,
    SocketReadFailed,
    SocketHungUp,
    SocketWriteFailed,
    ClientClosed,
    MalformedFrame,
    InboundBufferOverflow,
    PtyReadClosed,
}

impl ExitReason {
    fn as_str(self) -> &'static str {
        match self {
            ExitReason::Shutdown => "shutdown",
            ExitReason::PtyExited => "pty exited",
            ExitReason::PollFailed => "poll failed",
            ExitReason::SocketClosed => "socket closed",
            ExitReason::SocketReadFailed => "socket read failed",
            ExitReason::SocketHungUp => "socket hung up",
            ExitReason::SocketWriteFailed => "socket write failed",
            ExitReason::ClientClosed => "client sent close frame",
            ExitReason::MalformedFrame => "malformed frame",
            ExitReason::InboundBufferOverflow => "inbound buffer overflow",
            ExitReason::PtyReadClosed => "pty read closed",
        }
    }
}

#[derive(Deserialize)]
struct ResizeMessage {
    #[serde(rename = "type")]
    kind: String,
    cols: i64,
    rows: i64,
}

/// Attempt the strict `{"type":"resize","cols":N,"rows":M}` match. Any
/// other shape — including merely-similar JSON — is not a resize command
/// and falls through to raw input.
fn try_parse_resize(payload: &[u8]) -> Option<(u16, u16)> {
    let msg: ResizeMessage = serde_json::from_slice(payload).ok()?;
    if msg.kind != "resize" || msg.cols <= 0 || msg.rows <= 0 {
        return None;
    }
    Some((msg.cols as u16, msg.rows as u16))
}

enum Flow {
    Continue,
    Stop(ExitReason),
}

/// Drains as many complete frames as are available from `inbound`,
/// dispatching each by opcode. Returns `Flow::Stop` once a Close frame has
/// been handled (a reply Close has already been written) or a malformed
/// frame forces the connection closed.
fn drain_frames<S: Write>(inbound: &mut Vec<u8>, pty: &mut PtyChild, socket: &mut S) -> Flow {
    loop {
        match ws::parse_frame(inbound) {
            ParseOutcome::Insufficient => return Flow::Continue,
            ParseOutcome::Malformed => {
                tracing::warn!("rejecting frame with oversized claimed length");
                let _ = socket.write_all(&ws::build_close());
                return Flow::Stop(ExitReason::MalformedFrame);
            }
            ParseOutcome::Parsed { frame, consumed } => {
                inbound.drain(..consumed);

                match frame.opcode {
                    OpCode::Text | OpCode::Binary => {
                        let is_resize_candidate = frame.payload.first() == Some(&b'{');
                        let resize = is_resize_candidate.then(|| try_parse_resize(&frame.payload)).flatten();
                        match resize {
                            Some((cols, rows)) => {
                                pty.resize(cols, rows);
                            }
                            None => {
                                pty.write_all(&frame.payload);
                            }
                        }
                    }
                    OpCode::Ping => {
                        let _ = socket.write_all(&ws::build_pong(&frame.payload));
                    }
                    OpCode::Close => {
                        let _ = socket.write_all(&ws::build_close());
                        return Flow::Stop(ExitReason::ClientClosed);
                    }
                    OpCode::Continuation | OpCode::Pong | OpCode::Other(_) => {}
                }
            }
        }
    }
}

/// Run the per-connection bridge after a successful upgrade. Spawns the
/// PTY child for `session_name`; on spawn failure, sends one diagnostic
/// text frame and returns. Always tears down the PTY before returning,
/// regardless of exit path.
pub fn run<S>(socket: &mut S, session_name: &str, shutdown: &AtomicBool)
where
    S: Read + Write + AsRawFd,
{
    let mut pty = match PtyChild::spawn(session_name) {
        Ok(pty) => {
            tracing::debug!(session = session_name, "pty spawned");
            pty
        }
        Err(err) => {
            tracing::warn!(session = session_name, error = %err, "pty spawn failed");
            let msg = format!("Failed to attach to tmux session: {err}");
            let _ = socket.write_all(&ws::build_text(&msg));
            return;
        }
    };

    let reason = bridge_loop(socket, &mut pty, shutdown);
    tracing::debug!(reason = reason.as_str(), "bridge loop exited");
    pty.close();
}

fn bridge_loop<S>(socket: &mut S, pty: &mut PtyChild, shutdown: &AtomicBool) -> ExitReason
where
    S: Read + Write + AsRawFd,
{
    let mut inbound: Vec<u8> = Vec::new();
    let mut socket_buf = [0u8; PTY_READ_CHUNK];
    let mut pty_buf = [0u8; PTY_READ_CHUNK];

    loop {
        if shutdown.load(Ordering::Acquire) {
            return ExitReason::Shutdown;
        }
        if !pty.is_alive() {
            return ExitReason::PtyExited;
        }

        let socket_fd: RawFd = socket.as_raw_fd();
        let pty_fd: RawFd = pty.as_raw_fd();

        let mut fds = [
            PollFd::new(unsafe { BorrowedFd::borrow_raw(socket_fd) }, PollFlags::POLLIN),
            PollFd::new(unsafe { BorrowedFd::borrow_raw(pty_fd) }, PollFlags::POLLIN),
        ];

        match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => return ExitReason::PollFailed,
        }

        let socket_revents = fds[0].revents().unwrap_or(PollFlags::empty());
        let pty_revents = fds[1].revents().unwrap_or(PollFlags::empty());

        if socket_revents.contains(PollFlags::POLLIN) {
            match socket.read(&mut socket_buf) {
                Ok(0) => return ExitReason::SocketClosed,
                Ok(n) => {
                    inbound.extend_from_slice(&socket_buf[..n]);
                    if inbound.len() > MAX_INBOUND_BUFFER {
                        tracing::warn!(
                            len = inbound.len(),
                            "inbound buffer exceeded cap without a complete frame"
                        );
                        let _ = socket.write_all(&ws::build_close());
                        return ExitReason::InboundBufferOverflow;
                    }
                    if let Flow::Stop(reason) = drain_frames(&mut inbound, pty, socket) {
                        return reason;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => return ExitReason::SocketReadFailed,
            }
        } else if socket_revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
            return ExitReason::SocketHungUp;
        }

        if pty_revents.contains(PollFlags::POLLIN) {
            match pty.read(&mut pty_buf) {
                ReadOutcome::Data(n) => {
                    let frame = ws::build_binary(&pty_buf[..n]);
                    if socket.write_all(&frame).is_err() {
                        return ExitReason::SocketWriteFailed;
                    }
                }
                ReadOutcome::NoData => {}
                ReadOutcome::Closed => return ExitReason::PtyReadClosed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_pattern_matches_literal_json() {
        let payload = br#"{"type":"resize","cols":100,"rows":40}"#;
        assert_eq!(try_parse_resize(payload), Some((100, 40)));
    }

    #[test]
    fn resize_pattern_rejects_other_json_shapes() {
        assert_eq!(try_parse_resize(br#"{"type":"ping"}"#), None);
        assert_eq!(try_parse_resize(br#"{"cols":1,"rows":1}"#), None);
    }

    #[test]
    fn resize_pattern_rejects_non_json_braces() {
        assert_eq!(try_parse_resize(b"{ not json at all"), None);
    }

    #[test]
    fn resize_pattern_rejects_non_positive_dimensions() {
        assert_eq!(
            try_parse_resize(br#"{"type":"resize","cols":0,"rows":40}"#),
            None
        );
    }
}
