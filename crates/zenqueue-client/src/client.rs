use std::time::Duration;

use serde_json::{Map, Value};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use zenqueue::protocol::{timeout_to_value, Action, Request};

use crate::actor::{Claim, Command, ConnectionActor};
use crate::error::{ClientError, Result};

/// Commands a handle may queue before callers start lagging behind the
/// actor.
const COMMAND_BUFFER: usize = 64;

/// Handle to one shared server connection.
///
/// Cloning is cheap; all clones feed the same connection actor and their
/// calls are serialized in arrival order. Dropping every clone without
/// calling [`QueueClient::close`] ends the actor without the `quit`
/// exchange, which the server treats like an abrupt disconnect.
#[derive(Clone)]
pub struct QueueClient {
	commands: mpsc::Sender<Command>,
}

impl QueueClient {
	/// Connects to a ZenQueue server and spawns the connection actor.
	pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
		let stream = TcpStream::connect(addr).await?;
		let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
		tokio::spawn(ConnectionActor::new(stream, receiver).run());
		Ok(Self { commands })
	}

	/// Pushes one value onto the queue.
	pub async fn push(&self, value: Value) -> Result<()> {
		let request = Request::new(Action::Push).with_args(vec![value]);
		self.call(request, None).await.map(|_| ())
	}

	/// Pushes every value, in order.
	pub async fn push_many(&self, values: Vec<Value>) -> Result<()> {
		let request = Request::new(Action::PushMany).with_args(values);
		self.call(request, None).await.map(|_| ())
	}

	/// Pulls one value, waiting at most `timeout` for one to arrive.
	///
	/// The timeout covers the whole call: while the call is still queued
	/// behind other callers it can expire locally (the request is then
	/// cancelled without touching the socket); once the request has been
	/// written, expiry is the server's to report.
	pub async fn pull(&self, timeout: Option<Duration>) -> Result<Value> {
		let request = Request::new(Action::Pull).with_kwargs(timeout_kwargs(timeout));
		self.call(request, timeout).await
	}

	/// Pulls up to `n` values, `timeout` applying to each element
	/// separately; returns the prefix collected when the flow stops.
	pub async fn pull_many(&self, n: Option<usize>, timeout: Option<Duration>) -> Result<Vec<Value>> {
		let count = n.map_or(Value::Null, |n| Value::from(n as u64));
		let request = Request::new(Action::PullMany).with_args(vec![count]).with_kwargs(timeout_kwargs(timeout));
		match self.call(request, timeout).await? {
			Value::Array(values) => Ok(values),
			other => Err(ClientError::Unknown(format!("expected an array payload, got {other}"))),
		}
	}

	/// Raw escape hatch: performs an arbitrary action round-trip without
	/// a local timeout.
	pub async fn action(&self, action: Action, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Value> {
		self.call(Request { action, args, kwargs }, None).await
	}

	/// Sends `quit` and closes the connection. Queued calls behind the
	/// close and all later calls fail with [`ClientError::Closed`];
	/// closing an already-closed client is a no-op.
	pub async fn close(&self) -> Result<()> {
		let (done, closed) = oneshot::channel();
		if self.commands.send(Command::Close { done }).await.is_err() {
			return Ok(());
		}
		let _ = closed.await;
		Ok(())
	}

	async fn call(&self, request: Request, wait_timeout: Option<Duration>) -> Result<Value> {
		let (reply, mut outcome) = oneshot::channel();
		let claim = Claim::new();
		let command = Command::Call {
			request,
			claim: claim.clone(),
			reply,
		};
		self.commands.send(command).await.map_err(|_| ClientError::Closed)?;

		match wait_timeout {
			None => outcome.await.map_err(|_| ClientError::Closed)?,
			Some(limit) => {
				tokio::select! {
					result = &mut outcome => result.map_err(|_| ClientError::Closed)?,
					() = time::sleep(limit) => {
						if claim.take() {
							// Still queued; the actor will discard it.
							Err(ClientError::Timeout)
						} else {
							// Already on the wire; the response must be
							// read to keep the connection aligned.
							outcome.await.map_err(|_| ClientError::Closed)?
						}
					}
				}
			}
		}
	}
}

fn timeout_kwargs(timeout: Option<Duration>) -> Map<String, Value> {
	let mut kwargs = Map::new();
	if timeout.is_some() {
		kwargs.insert("timeout".to_string(), timeout_to_value(timeout));
	}
	kwargs
}
