//! Immutable server configuration, supplied once at startup by the CLI
//! and handed to the listener.

use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub session: String,
}
