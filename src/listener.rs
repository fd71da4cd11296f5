//! Listener/dispatcher: binds, accepts, and spawns one OS thread per
//! accepted connection. Holds the sole process-wide shared state — the
//! shutdown flag — and nothing else; there is no connection registry.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{self, SigHandler, Signal};
use socket2::{Domain, Socket, Type};

use crate::bridge;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::{self, FrontDoorOutcome};

const ACCEPT_POLL_MS: u16 = 100;
const LISTEN_BACKLOG: i32 = 128;

/// Process-wide shutdown flag. Written only by the signal handler (a
/// plain atomic store, async-signal-safe); read by the accept loop and
/// every bridge unit on each poll cycle.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_sig: i32) {
    SHUTDOWN.store(true, Ordering::Release);
}

fn install_signal_handlers() {
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown_signal));
        let _ = signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown_signal));
        // A client closing its read side must not kill the listener.
        let _ = signal::signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
}

/// Bind and run the accept loop until a shutdown signal arrives. Blocks
/// for the lifetime of the server.
pub fn run(config: ServerConfig) -> Result<(), ServerError> {
    install_signal_handlers();

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = bind_listener(addr).map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(ServerError::Listen)?;

    tracing::info!(%addr, session = %config.session, "listening");

    accept_loop(&listener, &config);

    tracing::info!("server stopped");
    Ok(())
}

/// Bind with `SO_REUSEADDR` set before `bind(2)`, so restarting the server
/// against the same port doesn't have to wait out a prior socket's
/// `TIME_WAIT`. `std::net::TcpListener::bind` has no hook for socket
/// options, so the socket is built and bound through `socket2` and only
/// handed back as a `std::net::TcpListener` once listening.
fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

fn accept_loop(listener: &TcpListener, config: &ServerConfig) {
    let listener_fd = listener.as_raw_fd();

    loop {
        if SHUTDOWN.load(Ordering::Acquire) {
            return;
        }

        let mut fds = [PollFd::new(
            unsafe { BorrowedFd::borrow_raw(listener_fd) },
            PollFlags::POLLIN,
        )];

        match poll(&mut fds, PollTimeout::from(ACCEPT_POLL_MS)) {
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => return,
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "accepted connection");
                let session = config.session.clone();
                thread::spawn(move || handle_connection(stream, &session));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                if SHUTDOWN.load(Ordering::Acquire) {
                    return;
                }
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}

/// The per-connection pipeline: C2 (HTTP) → C1 (handshake) → C4 (bridge),
/// run entirely on this thread. Cleans up the socket on every exit path.
fn handle_connection(mut stream: TcpStream, session_name: &str) {
    let result = http::handle_request(&mut stream);
    match result {
        Ok(FrontDoorOutcome::Upgraded) => {
            tracing::debug!(session = session_name, "upgraded, starting bridge");
            bridge::run(&mut stream, session_name, &SHUTDOWN);
        }
        Ok(FrontDoorOutcome::Responded) => {}
        Err(err) => {
            tracing::debug!(error = %err, "http front door error");
        }
    }
    let _ = stream.shutdown(std::net::Shutdown::Both);
}
