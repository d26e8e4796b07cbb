use thiserror::Error;

/// Errors surfaced to client callers.
///
/// The middle four mirror the server's response status vocabulary;
/// [`ClientError::Closed`] and [`ClientError::Io`] are local to the
/// client side.
#[derive(Error, Debug)]
pub enum ClientError {
	/// The connection has been closed; the client is unusable.
	#[error("client connection is closed")]
	Closed,

	/// The server rejected the frame (`error:request`).
	#[error("request rejected by server: {0}")]
	Request(String),

	/// The dispatched action failed (`error:action`).
	#[error("action failed on server: {0}")]
	Action(String),

	/// The pull timed out, either on the server (`error:timeout`) or while
	/// the call was still queued locally.
	#[error("timed out waiting for a value")]
	Timeout,

	/// The server reported an internal error, or its response was
	/// unreadable. The connection is considered dead afterwards.
	#[error("unknown server error: {0}")]
	Unknown(String),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
