mod client;
mod server;
mod worker;

pub use client::{ClientError, DaemonClient};
pub use server::run_daemon;

use std::path::PathBuf;

use crate::config::runtime_dir;

const SOCKET_NAME: &str = "gauge.sock";

pub fn socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_NAME)
}

pub fn is_daemon_running() -> bool {
    DaemonClient::connect().is_ok()
}
