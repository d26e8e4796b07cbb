//! Per-connection read/dispatch/respond loop for the native protocol.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use zenqueue::error::ProtocolError;
use zenqueue::protocol::{Action, Request, Response};
use zenqueue::Queue;

use crate::dispatch::{dispatch, DispatchError};

/// Serves one client until it quits, disconnects, errors fatally, or the
/// server shuts down. Client ids appear in hex throughout the logs.
pub async fn handle_connection(queue: Arc<Queue>, stream: TcpStream, peer: SocketAddr, client_id: u64, shutdown: CancellationToken) {
	tracing::info!("client {client_id:x} connected: {peer}");

	let (read_half, mut write_half) = stream.into_split();
	let mut reader = BufReader::new(read_half);
	let mut line = String::new();

	loop {
		line.clear();
		let read = tokio::select! {
			read = reader.read_line(&mut line) => read,
			() = shutdown.cancelled() => break,
		};
		match read {
			Ok(0) => break,
			Ok(_) => {}
			Err(err) => {
				tracing::debug!("client {client_id:x} read error: {err}");
				break;
			}
		}

		let frame = line.trim_end_matches(['\r', '\n']);
		if frame.is_empty() {
			// Empty lines get no response at all.
			continue;
		}

		let request = match Request::from_line(frame) {
			Ok(request) => request,
			Err(ProtocolError::UnknownAction) => {
				tracing::error!("missing action requested by client {client_id:x}");
				if write_response(&mut write_half, &Response::request_error("action not found")).await.is_err() {
					break;
				}
				continue;
			}
			Err(_) => {
				tracing::error!("received malformed request from client {client_id:x}");
				if write_response(&mut write_half, &Response::request_error("malformed request")).await.is_err() {
					break;
				}
				continue;
			}
		};

		if request.action == Action::Quit {
			// Half-close without a response; the client sees EOF.
			let _ = write_half.shutdown().await;
			break;
		}

		tracing::debug!("action '{}' requested by client {client_id:x}", request.action);
		let (response, disconnect) = match dispatch(&queue, &request).await {
			Ok(payload) => (Response::success(payload), false),
			Err(DispatchError::Timeout) => (Response::timeout(), false),
			Err(DispatchError::Action(message)) => {
				tracing::error!("action '{}' raised an error for client {client_id:x}: {message}", request.action);
				(Response::action_error(&message), false)
			}
			Err(DispatchError::Internal(message)) => {
				tracing::error!("unknown error occurred for client {client_id:x}: {message}");
				(Response::unknown_error(&message), true)
			}
		};

		if write_response(&mut write_half, &response).await.is_err() {
			tracing::error!("forcing disconnection of client {client_id:x}");
			break;
		}
		if disconnect {
			break;
		}
	}

	tracing::info!("client {client_id:x} disconnected");
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
	writer.write_all(response.to_line().as_bytes()).await?;
	writer.flush().await
}
