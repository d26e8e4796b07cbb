//! The connection actor: a task that exclusively owns the socket and
//! serializes round-trips for every handle that clones the client.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use zenqueue::protocol::{Action, Request, Response, Status};

use crate::error::{ClientError, Result};

/// Ownership marker for a queued call, shared between the caller and the
/// actor. Whoever takes it first decides the call's fate: the actor writes
/// the request to the socket, or the caller abandons it with a timeout.
#[derive(Clone, Debug)]
pub(crate) struct Claim(Arc<AtomicBool>);

impl Claim {
	pub(crate) fn new() -> Self {
		Self(Arc::new(AtomicBool::new(false)))
	}

	/// Attempts to take ownership; returns false if the other side already
	/// has it.
	pub(crate) fn take(&self) -> bool {
		self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}
}

/// The client's internal command stream: either a call with a reply slot
/// or a close directive.
pub(crate) enum Command {
	Call {
		request: Request,
		claim: Claim,
		reply: oneshot::Sender<Result<Value>>,
	},
	Close {
		done: oneshot::Sender<()>,
	},
}

pub(crate) struct ConnectionActor {
	stream: BufStream<TcpStream>,
	commands: mpsc::Receiver<Command>,
}

impl ConnectionActor {
	pub(crate) fn new(stream: TcpStream, commands: mpsc::Receiver<Command>) -> Self {
		Self {
			stream: BufStream::new(stream),
			commands,
		}
	}

	/// Processes commands in arrival order until the client is closed, the
	/// last handle is dropped, or the connection dies.
	///
	/// Once a request has been written its response is always read; a
	/// caller that timed out while its command was still queued has
	/// claimed the command already, and the actor skips it without
	/// touching the socket.
	pub(crate) async fn run(mut self) {
		while let Some(command) = self.commands.recv().await {
			match command {
				Command::Call { request, claim, reply } => {
					if !claim.take() {
						continue;
					}
					let outcome = self.round_trip(&request).await;
					let fatal = matches!(outcome, Err(ClientError::Io(_) | ClientError::Unknown(_)));
					let _ = reply.send(outcome);
					if fatal {
						tracing::debug!("connection actor stopping after fatal response");
						break;
					}
				}
				Command::Close { done } => {
					if let Err(err) = self.send_quit().await {
						tracing::debug!("error while closing connection: {err}");
					}
					let _ = done.send(());
					break;
				}
			}
		}
		// Dropping the receiver fails queued and future commands, which
		// their callers observe as `Closed`.
	}

	async fn round_trip(&mut self, request: &Request) -> Result<Value> {
		self.stream.write_all(request.to_line().as_bytes()).await?;
		self.stream.flush().await?;

		let mut line = String::new();
		let read = self.stream.read_line(&mut line).await?;
		if read == 0 {
			return Err(ClientError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection")));
		}

		let response =
			Response::from_line(line.trim_end_matches(['\r', '\n'])).map_err(|err| ClientError::Unknown(err.to_string()))?;
		match response.status {
			Status::Success => Ok(response.payload),
			Status::RequestError => Err(ClientError::Request(payload_message(response.payload))),
			Status::ActionError => Err(ClientError::Action(payload_message(response.payload))),
			Status::Timeout => Err(ClientError::Timeout),
			Status::UnknownError => Err(ClientError::Unknown(payload_message(response.payload))),
		}
	}

	/// Sends `["quit"]` and closes the write side. The server does not
	/// reply to quit.
	async fn send_quit(&mut self) -> Result<()> {
		self.stream.write_all(Request::new(Action::Quit).to_line().as_bytes()).await?;
		self.stream.flush().await?;
		self.stream.get_mut().shutdown().await?;
		Ok(())
	}
}

fn payload_message(payload: Value) -> String {
	match payload {
		Value::String(message) => message,
		other => other.to_string(),
	}
}
