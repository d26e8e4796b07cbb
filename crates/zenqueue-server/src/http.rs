//! HTTP adapter: one POST route per queue action.
//!
//! The body is `[args, kwargs]` with both elements optional; the response
//! body is the same `[status, payload]` JSON the native protocol uses, so
//! a client can switch transports without reinterpreting results.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;

use zenqueue::protocol::{Action, Request, Status};
use zenqueue::Queue;

use crate::dispatch::{dispatch, DispatchError};
use crate::error::{Result, ServerError};

/// Builds the adapter's router around a shared queue.
pub fn router(queue: Arc<Queue>, max_connections: usize) -> Router {
	Router::new()
		.route("/push/", post(push))
		.route("/pull/", post(pull))
		.route("/push_many/", post(push_many))
		.route("/pull_many/", post(pull_many))
		.fallback(action_not_found)
		.layer(ConcurrencyLimitLayer::new(max_connections))
		.with_state(queue)
}

/// Serves the adapter until the token is cancelled.
pub async fn serve(listener: TcpListener, queue: Arc<Queue>, max_connections: usize, shutdown: CancellationToken) -> Result<()> {
	let app = router(queue, max_connections);
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown.cancelled_owned())
		.await
		.map_err(ServerError::Http)
}

async fn push(State(queue): State<Arc<Queue>>, body: Bytes) -> Response {
	perform(&queue, Action::Push, &body).await
}

async fn pull(State(queue): State<Arc<Queue>>, body: Bytes) -> Response {
	perform(&queue, Action::Pull, &body).await
}

async fn push_many(State(queue): State<Arc<Queue>>, body: Bytes) -> Response {
	perform(&queue, Action::PushMany, &body).await
}

async fn pull_many(State(queue): State<Arc<Queue>>, body: Bytes) -> Response {
	perform(&queue, Action::PullMany, &body).await
}

async fn perform(queue: &Queue, action: Action, body: &[u8]) -> Response {
	let (args, kwargs) = match unpack_body(body) {
		Ok(parts) => parts,
		Err(err) => {
			tracing::error!("received malformed request for '{action}': {err}");
			return rpc_response(StatusCode::BAD_REQUEST, Status::RequestError, Value::String("malformed request".to_string()));
		}
	};

	let request = Request { action, args, kwargs };
	tracing::debug!("action '{action}' requested over http");
	match dispatch(queue, &request).await {
		Ok(payload) => rpc_response(StatusCode::OK, Status::Success, payload),
		Err(DispatchError::Timeout) => rpc_response(StatusCode::OK, Status::Timeout, Value::Null),
		Err(DispatchError::Action(message)) => {
			tracing::error!("action '{action}' raised an error: {message}");
			rpc_response(StatusCode::INTERNAL_SERVER_ERROR, Status::ActionError, Value::String(message))
		}
		Err(DispatchError::Internal(message)) => {
			tracing::error!("unknown error occurred during '{action}': {message}");
			rpc_response(StatusCode::INTERNAL_SERVER_ERROR, Status::UnknownError, Value::String(message))
		}
	}
}

/// Splits a `[args, kwargs]` body; an empty body means no arguments.
fn unpack_body(body: &[u8]) -> std::result::Result<(Vec<Value>, Map<String, Value>), String> {
	if body.is_empty() {
		return Ok((Vec::new(), Map::new()));
	}

	let parsed: Value = serde_json::from_slice(body).map_err(|err| err.to_string())?;
	let Value::Array(elements) = parsed else {
		return Err("expected an array body".to_string());
	};
	if elements.len() > 2 {
		return Err(format!("expected at most 2 elements, got {}", elements.len()));
	}
	let mut elements = elements.into_iter();

	let args = match elements.next() {
		None => Vec::new(),
		Some(Value::Array(args)) => args,
		Some(other) => return Err(format!("args must be an array, got {other}")),
	};
	let kwargs = match elements.next() {
		None => Map::new(),
		Some(Value::Object(kwargs)) => kwargs,
		Some(other) => return Err(format!("kwargs must be an object, got {other}")),
	};

	Ok((args, kwargs))
}

async fn action_not_found() -> Response {
	rpc_response(StatusCode::NOT_FOUND, Status::RequestError, Value::String("action not found".to_string()))
}

fn rpc_response(code: StatusCode, status: Status, payload: Value) -> Response {
	let body = Value::Array(vec![Value::String(status.as_str().to_string()), payload]);
	(code, Json(body)).into_response()
}
