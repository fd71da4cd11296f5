//! Command-line entry point. Parses flags, resolves the target tmux
//! session (interactively if none was given on the command line), prints
//! a startup banner, and hands control to the listener.

use std::net::IpAddr;
use std::process::ExitCode;

use clap::Parser;

use webmux::config::ServerConfig;
use webmux::error::ServerError;
use webmux::{listener, picker, session};

const DEFAULT_PORT: u16 = 8080;

/// Stream a tmux session to a web browser over a WebSocket bridge.
#[derive(Parser, Debug)]
#[command(name = "webmux", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// tmux session to attach to (omit for an interactive picker).
    #[arg(short, long)]
    session: Option<String>,

    /// Address to bind to.
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// List available tmux sessions and exit.
    #[arg(short, long)]
    list: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("webmux: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();

    if cli.list {
        print_session_table();
        return Ok(());
    }

    if cli.port == 0 {
        return Err(ServerError::InvalidPort(cli.port as i64));
    }

    let bind_addr: IpAddr = cli
        .bind
        .parse()
        .map_err(|_| ServerError::InvalidPort(cli.port as i64))?;

    let session_name = match cli.session {
        Some(name) => name,
        None => {
            let sessions = session::list_sessions().unwrap_or_default();
            picker::select_interactive(&sessions)?
        }
    };

    print_banner(&session_name, &cli.bind, cli.port);

    let config = ServerConfig {
        bind_addr,
        port: cli.port,
        session: session_name,
    };

    listener::run(config)
}

fn print_session_table() {
    match session::list_sessions() {
        Ok(sessions) if !sessions.is_empty() => {
            println!();
            println!("  {:<20}  {:>7}  {}", "SESSION", "WINDOWS", "ATTACHED");
            for s in &sessions {
                println!(
                    "  {:<20}  {:>7}  {}",
                    s.name,
                    s.windows,
                    if s.attached { "yes" } else { "no" }
                );
            }
            println!();
        }
        _ => {
            println!("No tmux sessions found.");
            println!("Create one with: tmux new -s <name>");
        }
    }
}

fn print_banner(session: &str, bind: &str, port: u16) {
    println!();
    println!("  webmux");
    println!("  ─────────────────────────────────");
    println!("  session:  {session}");
    println!("  url:      http://{bind}:{port}");
    println!("  ─────────────────────────────────");
    println!("  press Ctrl+C to stop");
    println!();
}
