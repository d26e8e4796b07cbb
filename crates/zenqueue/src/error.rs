use thiserror::Error;

/// Failure modes of [`crate::Semaphore::acquire`]. Anything else is a
/// programming error and panics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreError {
	#[error("timed out waiting for a permit")]
	Timeout,

	#[error("wait cancelled")]
	WaitCancelled,
}

/// Failure modes of the pull side of [`crate::Queue`]. The push side is
/// infallible.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
	#[error("timed out waiting for a value")]
	Timeout,

	#[error("wait cancelled")]
	WaitCancelled,
}

impl From<SemaphoreError> for QueueError {
	fn from(err: SemaphoreError) -> Self {
		match err {
			SemaphoreError::Timeout => Self::Timeout,
			SemaphoreError::WaitCancelled => Self::WaitCancelled,
		}
	}
}

/// Errors produced while encoding or decoding protocol frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
	#[error("malformed request")]
	MalformedRequest,

	#[error("action not found")]
	UnknownAction,

	#[error("malformed response: {0}")]
	MalformedResponse(String),

	#[error("unknown status: {0}")]
	UnknownStatus(String),
}
