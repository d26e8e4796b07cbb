use clap::Parser;

use crate::listener::DEFAULT_MAX_CONNECTIONS;

pub const DEFAULT_NATIVE_PORT: u16 = 3000;
pub const DEFAULT_HTTP_PORT: u16 = 3080;

/// Command-line and environment configuration for `zenqueued`.
#[derive(Parser, Clone, Debug)]
#[command(name = "zenqueued", version, about = "In-memory FIFO message queue server", long_about = None)]
pub struct Config {
	/// Bind to this interface
	#[arg(short, long, env = "ZENQUEUE_INTERFACE", default_value = "0.0.0.0")]
	pub interface: String,

	/// Listen on this port [default: 3000, or 3080 with --http]
	#[arg(short, long, env = "ZENQUEUE_PORT")]
	pub port: Option<u16>,

	/// Allow at most this many concurrently connected clients
	#[arg(short = 'c', long, env = "ZENQUEUE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
	pub max_connections: usize,

	/// Log level (trace, debug, info, warn, error; silent disables output)
	#[arg(short = 'l', long, env = "ZENQUEUE_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// Serve the HTTP adapter instead of the native line protocol
	#[arg(long, env = "ZENQUEUE_HTTP")]
	pub http: bool,
}

impl Config {
	/// The port to bind, falling back to the per-mode default.
	#[must_use]
	pub fn port(&self) -> u16 {
		self.port.unwrap_or(if self.http { DEFAULT_HTTP_PORT } else { DEFAULT_NATIVE_PORT })
	}

	/// `EnvFilter` directive for the requested level; `silent` disables
	/// logging output entirely.
	#[must_use]
	pub fn log_directive(&self) -> String {
		let level = self.log_level.to_ascii_lowercase();
		if level == "silent" {
			"off".to_string()
		} else {
			level
		}
	}
}
