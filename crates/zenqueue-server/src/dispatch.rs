//! Dispatch table from resolved actions to queue operations.
//!
//! Shared by the native connection handler and the HTTP adapter. Argument
//! unpacking happens here: each action knows its positional and keyword
//! parameters, and anything else (unknown keywords, duplicate values,
//! wrong arity, wrong types) is an action error that the transport maps
//! to `error:action`.

use std::time::Duration;

use serde_json::Value;

use zenqueue::protocol::{timeout_from_value, Action, Request};
use zenqueue::{Queue, QueueError};

/// Why a dispatched action produced no success payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
	/// Bad arguments or a failed operation; the connection survives.
	Action(String),
	/// The pull's wait expired.
	Timeout,
	/// The handler is in an unexpected state; the transport drops the
	/// connection after replying.
	Internal(String),
}

type Result<T> = std::result::Result<T, DispatchError>;

/// Runs one request against the queue and returns the success payload.
///
/// `quit` never reaches this function: the connection handler intercepts
/// it, and the HTTP adapter has no route for it.
pub async fn dispatch(queue: &Queue, request: &Request) -> Result<Value> {
	match request.action {
		Action::Push => {
			let value = push_args(request)?;
			queue.push(value);
			Ok(Value::Null)
		}
		Action::PushMany => {
			let values = push_many_args(request)?;
			queue.push_many(values);
			Ok(Value::Null)
		}
		Action::Pull => {
			let timeout = pull_args(request)?;
			match queue.pull(timeout).await {
				Ok(value) => Ok(value),
				Err(err) => Err(queue_error(err)),
			}
		}
		Action::PullMany => {
			let (n, timeout) = pull_many_args(request)?;
			match queue.pull_many(n, timeout).await {
				Ok(values) => Ok(Value::Array(values)),
				Err(err) => Err(queue_error(err)),
			}
		}
		Action::Quit => Err(DispatchError::Internal("quit must be handled by the connection handler".to_string())),
	}
}

fn queue_error(err: QueueError) -> DispatchError {
	match err {
		QueueError::Timeout => DispatchError::Timeout,
		QueueError::WaitCancelled => DispatchError::Internal("wait cancelled".to_string()),
	}
}

fn push_args(request: &Request) -> Result<Value> {
	reject_unknown_kwargs(request, &[])?;
	if request.args.len() != 1 {
		return Err(DispatchError::Action(format!("push takes exactly one value, got {}", request.args.len())));
	}
	Ok(request.args[0].clone())
}

fn push_many_args(request: &Request) -> Result<Vec<Value>> {
	reject_unknown_kwargs(request, &[])?;
	Ok(request.args.clone())
}

fn pull_args(request: &Request) -> Result<Option<Duration>> {
	reject_unknown_kwargs(request, &["timeout"])?;
	if request.args.len() > 1 {
		return Err(DispatchError::Action(format!(
			"pull takes at most one positional argument, got {}",
			request.args.len()
		)));
	}
	let timeout = argument(request, "pull", 0, "timeout")?;
	parse_timeout(timeout)
}

fn pull_many_args(request: &Request) -> Result<(Option<usize>, Option<Duration>)> {
	reject_unknown_kwargs(request, &["n", "timeout"])?;
	if request.args.len() > 2 {
		return Err(DispatchError::Action(format!(
			"pull_many takes at most two positional arguments, got {}",
			request.args.len()
		)));
	}

	let n = match argument(request, "pull_many", 0, "n")? {
		None => return Err(DispatchError::Action("pull_many missing required argument 'n'".to_string())),
		Some(Value::Null) => None,
		Some(Value::Number(number)) => match number.as_u64() {
			Some(n) => Some(n as usize),
			None => return Err(DispatchError::Action(format!("'n' must be a non-negative integer or null, got {number}"))),
		},
		Some(other) => return Err(DispatchError::Action(format!("'n' must be a non-negative integer or null, got {other}"))),
	};

	let timeout = parse_timeout(argument(request, "pull_many", 1, "timeout")?)?;
	Ok((n, timeout))
}

/// Looks a parameter up by position or keyword, rejecting duplicates.
fn argument<'r>(request: &'r Request, action: &str, index: usize, name: &str) -> Result<Option<&'r Value>> {
	let positional = request.args.get(index);
	let keyword = request.kwargs.get(name);
	if positional.is_some() && keyword.is_some() {
		return Err(DispatchError::Action(format!("{action} got multiple values for '{name}'")));
	}
	Ok(positional.or(keyword))
}

fn reject_unknown_kwargs(request: &Request, allowed: &[&str]) -> Result<()> {
	for key in request.kwargs.keys() {
		if !allowed.contains(&key.as_str()) {
			return Err(DispatchError::Action(format!(
				"{} got an unexpected keyword argument '{key}'",
				request.action
			)));
		}
	}
	Ok(())
}

fn parse_timeout(value: Option<&Value>) -> Result<Option<Duration>> {
	match value {
		None => Ok(None),
		Some(value) => timeout_from_value(value).map_err(DispatchError::Action),
	}
}
