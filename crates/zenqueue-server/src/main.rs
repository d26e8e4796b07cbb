use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::EnvFilter;

use zenqueue::Queue;
use zenqueue_server::listener::Server;
use zenqueue_server::{http, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::parse();
	init_tracing(&config);

	let port = config.port();
	tracing::info!("ZenQueue server v{}", env!("CARGO_PKG_VERSION"));
	if config.interface == "0.0.0.0" {
		tracing::info!("serving on {}:{port} (all interfaces)", config.interface);
	} else {
		tracing::info!("serving on {}:{port}", config.interface);
	}

	let listener = Server::bind(&config.interface, port).await?;
	let queue = Arc::new(Queue::new());
	let shutdown = CancellationToken::new();

	let signal_task = {
		let shutdown = shutdown.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("received interrupt signal");
				shutdown.cancel();
			}
		})
	};

	if config.http {
		http::serve(listener, queue, config.max_connections, shutdown.clone()).await?;
	} else {
		Server::new(queue, config.max_connections, shutdown.clone()).serve(listener).await?;
	}

	signal_task.abort();
	tracing::info!("shutdown complete");
	Ok(())
}

fn init_tracing(config: &Config) {
	let filter = match EnvFilter::try_new(config.log_directive()) {
		Ok(filter) => filter,
		Err(_) => {
			eprintln!("invalid log level supplied, defaulting to info");
			EnvFilter::new("info")
		}
	};
	tracing_subscriber::fmt().with_env_filter(filter).init();
}
