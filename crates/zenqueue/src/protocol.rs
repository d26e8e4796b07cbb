//! Wire vocabulary for the line-delimited RPC protocol.
//!
//! A request frame is a JSON array of one to three elements,
//! `[action, args?, kwargs?]`, terminated by CRLF. A response frame is
//! `[status, payload]`, same framing. Frames are self-contained; the
//! protocol keeps no state between them.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Line terminator for both directions.
pub const LINE_ENDING: &str = "\r\n";

/// The operations a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	Push,
	PushMany,
	Pull,
	PullMany,
	Quit,
}

impl Action {
	/// Resolves a wire name. `exit` and `shutdown` are aliases for `quit`.
	pub fn resolve(name: &str) -> Result<Self, ProtocolError> {
		match name {
			"push" => Ok(Self::Push),
			"push_many" => Ok(Self::PushMany),
			"pull" => Ok(Self::Pull),
			"pull_many" => Ok(Self::PullMany),
			"quit" | "exit" | "shutdown" => Ok(Self::Quit),
			_ => Err(ProtocolError::UnknownAction),
		}
	}

	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Push => "push",
			Self::PushMany => "push_many",
			Self::Pull => "pull",
			Self::PullMany => "pull_many",
			Self::Quit => "quit",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One parsed request frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	pub action: Action,
	pub args: Vec<Value>,
	pub kwargs: Map<String, Value>,
}

impl Request {
	#[must_use]
	pub fn new(action: Action) -> Self {
		Self {
			action,
			args: Vec::new(),
			kwargs: Map::new(),
		}
	}

	#[must_use]
	pub fn with_args(mut self, args: Vec<Value>) -> Self {
		self.args = args;
		self
	}

	#[must_use]
	pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
		self.kwargs = kwargs;
		self
	}

	/// Parses a request from a line with the terminator already stripped.
	///
	/// Missing trailing elements default to empty; a frame that is not a
	/// 1-3 element array with an array `args` and an object `kwargs` is
	/// malformed, while a well-shaped frame naming an unrecognized action
	/// is [`ProtocolError::UnknownAction`].
	pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
		let frame: Value = serde_json::from_str(line).map_err(|_| ProtocolError::MalformedRequest)?;
		let Value::Array(elements) = frame else {
			return Err(ProtocolError::MalformedRequest);
		};
		if elements.is_empty() || elements.len() > 3 {
			return Err(ProtocolError::MalformedRequest);
		}
		let mut elements = elements.into_iter();

		let Some(Value::String(name)) = elements.next() else {
			return Err(ProtocolError::MalformedRequest);
		};
		let args = match elements.next() {
			None => Vec::new(),
			Some(Value::Array(args)) => args,
			Some(_) => return Err(ProtocolError::MalformedRequest),
		};
		let kwargs = match elements.next() {
			None => Map::new(),
			Some(Value::Object(kwargs)) => kwargs,
			Some(_) => return Err(ProtocolError::MalformedRequest),
		};

		let action = Action::resolve(&name)?;
		Ok(Self { action, args, kwargs })
	}

	/// Encodes the request as a single CRLF-terminated line.
	#[must_use]
	pub fn to_line(&self) -> String {
		let frame = Value::Array(vec![
			Value::String(self.action.as_str().to_string()),
			Value::Array(self.args.clone()),
			Value::Object(self.kwargs.clone()),
		]);
		let mut line = frame.to_string();
		line.push_str(LINE_ENDING);
		line
	}
}

/// Response status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Success,
	RequestError,
	ActionError,
	Timeout,
	UnknownError,
}

impl Status {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::RequestError => "error:request",
			Self::ActionError => "error:action",
			Self::Timeout => "error:timeout",
			Self::UnknownError => "error:unknown",
		}
	}

	pub fn resolve(name: &str) -> Result<Self, ProtocolError> {
		match name {
			"success" => Ok(Self::Success),
			"error:request" => Ok(Self::RequestError),
			"error:action" => Ok(Self::ActionError),
			"error:timeout" => Ok(Self::Timeout),
			"error:unknown" => Ok(Self::UnknownError),
			other => Err(ProtocolError::UnknownStatus(other.to_string())),
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One response frame: `[status, payload]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	pub status: Status,
	pub payload: Value,
}

impl Response {
	#[must_use]
	pub fn success(payload: Value) -> Self {
		Self {
			status: Status::Success,
			payload,
		}
	}

	#[must_use]
	pub fn request_error(message: &str) -> Self {
		Self {
			status: Status::RequestError,
			payload: Value::String(message.to_string()),
		}
	}

	#[must_use]
	pub fn action_error(message: &str) -> Self {
		Self {
			status: Status::ActionError,
			payload: Value::String(message.to_string()),
		}
	}

	#[must_use]
	pub fn timeout() -> Self {
		Self {
			status: Status::Timeout,
			payload: Value::Null,
		}
	}

	#[must_use]
	pub fn unknown_error(message: &str) -> Self {
		Self {
			status: Status::UnknownError,
			payload: Value::String(message.to_string()),
		}
	}

	/// Parses a response from a line with the terminator already stripped.
	pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
		let frame: Value = serde_json::from_str(line).map_err(|err| ProtocolError::MalformedResponse(err.to_string()))?;
		let Value::Array(elements) = frame else {
			return Err(ProtocolError::MalformedResponse("expected an array".to_string()));
		};
		if elements.len() != 2 {
			return Err(ProtocolError::MalformedResponse(format!("expected 2 elements, got {}", elements.len())));
		}
		let mut elements = elements.into_iter();
		let Some(Value::String(status)) = elements.next() else {
			return Err(ProtocolError::MalformedResponse("status is not a string".to_string()));
		};
		let payload = elements.next().unwrap_or(Value::Null);

		Ok(Self {
			status: Status::resolve(&status)?,
			payload,
		})
	}

	/// Encodes the response as a single CRLF-terminated line.
	#[must_use]
	pub fn to_line(&self) -> String {
		let frame = Value::Array(vec![Value::String(self.status.as_str().to_string()), self.payload.clone()]);
		let mut line = frame.to_string();
		line.push_str(LINE_ENDING);
		line
	}
}

/// Converts a wire timeout (seconds as a JSON number, or null) into a
/// `Duration`. Negative and non-finite values are rejected.
pub fn timeout_from_value(value: &Value) -> Result<Option<Duration>, String> {
	match value {
		Value::Null => Ok(None),
		Value::Number(number) => {
			let seconds = number.as_f64().ok_or_else(|| format!("timeout out of range: {number}"))?;
			if !seconds.is_finite() || seconds < 0.0 {
				return Err(format!("timeout must be a non-negative number, got {seconds}"));
			}
			Ok(Some(Duration::from_secs_f64(seconds)))
		}
		other => Err(format!("timeout must be a number or null, got {other}")),
	}
}

/// Converts a `Duration` into its wire representation in seconds.
#[must_use]
pub fn timeout_to_value(timeout: Option<Duration>) -> Value {
	match timeout {
		None => Value::Null,
		Some(duration) => {
			let seconds = duration.as_secs_f64();
			Value::from(seconds)
		}
	}
}
