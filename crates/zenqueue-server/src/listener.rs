//! TCP listener with a bounded worker pool.
//!
//! A pool slot is taken before `accept`, so the number of in-flight
//! connection handlers can never exceed `max_connections`; further
//! clients sit in the kernel backlog until a slot frees.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::time;
use tokio_util::sync::CancellationToken;

use zenqueue::Queue;

use crate::error::{Result, ServerError};
use crate::handler::handle_connection;

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// How long shutdown waits for in-flight handlers before giving up.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
	queue: Arc<Queue>,
	max_connections: usize,
	shutdown: CancellationToken,
}

impl Server {
	#[must_use]
	pub fn new(queue: Arc<Queue>, max_connections: usize, shutdown: CancellationToken) -> Self {
		Self {
			queue,
			max_connections,
			shutdown,
		}
	}

	/// Binds a listener, reporting failures with the attempted address.
	pub async fn bind(interface: &str, port: u16) -> Result<TcpListener> {
		let addr = format!("{interface}:{port}");
		TcpListener::bind(&addr).await.map_err(|source| ServerError::Bind { addr, source })
	}

	/// Accepts clients until shut down, then drains in-flight handlers.
	pub async fn serve(&self, listener: TcpListener) -> Result<()> {
		let pool = Arc::new(Semaphore::new(self.max_connections));
		let mut next_client: u64 = 0;

		loop {
			let permit = tokio::select! {
				permit = pool.clone().acquire_owned() => match permit {
					Ok(permit) => permit,
					Err(_) => break,
				},
				() = self.shutdown.cancelled() => break,
			};

			let (stream, peer) = tokio::select! {
				accepted = listener.accept() => match accepted {
					Ok(accepted) => accepted,
					Err(err) if is_transient(&err) => {
						// Clients that vanish mid-handshake are routine.
						tracing::warn!("transient accept error: {err}");
						continue;
					}
					Err(err) => return Err(ServerError::Accept(err)),
				},
				() = self.shutdown.cancelled() => break,
			};

			let client_id = next_client;
			next_client += 1;

			let queue = self.queue.clone();
			let shutdown = self.shutdown.clone();
			tokio::spawn(async move {
				let _permit = permit;
				handle_connection(queue, stream, peer, client_id, shutdown).await;
			});
		}

		tracing::info!("shutting down server");
		drop(listener);
		// Handlers blocked in an untimed pull would stall the drain.
		self.queue.cancel_waiters();
		self.drain(&pool).await;
		Ok(())
	}

	async fn drain(&self, pool: &Arc<Semaphore>) {
		let all = u32::try_from(self.max_connections).unwrap_or(u32::MAX);
		match time::timeout(DRAIN_GRACE, pool.acquire_many(all)).await {
			Ok(_) => tracing::info!("all client handlers finished"),
			Err(_) => tracing::warn!("shutdown grace period expired with handlers still running"),
		}
	}
}

fn is_transient(err: &io::Error) -> bool {
	matches!(
		err.kind(),
		io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
	)
}
