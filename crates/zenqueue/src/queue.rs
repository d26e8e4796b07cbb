//! The shared FIFO queue.
//!
//! Values are opaque JSON documents; the queue stores and returns them
//! verbatim. Producers never block: `push` appends and releases one permit
//! on the internal [`Semaphore`]. Consumers acquire a permit (optionally
//! with a timeout) and are then guaranteed a value to pop.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::error::QueueError;
use crate::semaphore::Semaphore;

type Result<T> = std::result::Result<T, QueueError>;

pub struct Queue {
	values: Mutex<VecDeque<Value>>,
	available: Semaphore,
}

impl Default for Queue {
	fn default() -> Self {
		Self::new()
	}
}

impl Queue {
	#[must_use]
	pub fn new() -> Self {
		Self {
			values: Mutex::new(VecDeque::new()),
			available: Semaphore::new(0),
		}
	}

	/// Creates a queue seeded with existing values, oldest first. The
	/// permit counter starts at the seed length.
	#[must_use]
	pub fn with_initial(values: impl IntoIterator<Item = Value>) -> Self {
		let values: VecDeque<Value> = values.into_iter().collect();
		let available = Semaphore::new(values.len());
		Self {
			values: Mutex::new(values),
			available,
		}
	}

	fn values(&self) -> MutexGuard<'_, VecDeque<Value>> {
		self.values.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Appends a value to the tail. Never blocks, never fails.
	pub fn push(&self, value: Value) {
		self.values().push_back(value);
		self.available.release();
	}

	/// Pushes each value in argument order. Not atomic: an interleaved
	/// pull may observe a prefix.
	pub fn push_many(&self, values: impl IntoIterator<Item = Value>) {
		for value in values {
			self.push(value);
		}
	}

	/// Removes and returns the head value, waiting for one to arrive if
	/// the queue is empty.
	pub async fn pull(&self, timeout: Option<Duration>) -> Result<Value> {
		self.available.acquire(timeout).await?;
		match self.values().pop_front() {
			Some(value) => Ok(value),
			// A held permit always corresponds to a queued value.
			None => unreachable!("acquired a permit but the queue was empty"),
		}
	}

	/// Pulls up to `n` values, applying `timeout` to each element
	/// separately.
	///
	/// A timeout on the first element is an error; on any later element it
	/// ends the batch and the prefix collected so far is returned.
	/// Cancellation mid-batch ends it the same way: values already
	/// dequeued are always delivered, never dropped. `n = Some(0)` returns
	/// an empty vec without blocking. With both `n` and `timeout` unset
	/// this is sink mode: it pulls (and discards) forever, which only
	/// makes sense for drain consumers.
	pub async fn pull_many(&self, n: Option<usize>, timeout: Option<Duration>) -> Result<Vec<Value>> {
		if n.is_none() && timeout.is_none() {
			loop {
				self.pull(None).await?;
			}
		}

		let mut results = Vec::new();
		let mut remaining = n;
		loop {
			if remaining == Some(0) {
				break;
			}
			match self.pull(timeout).await {
				Ok(value) => {
					results.push(value);
					if let Some(left) = remaining.as_mut() {
						*left -= 1;
					}
				}
				Err(QueueError::Timeout | QueueError::WaitCancelled) if !results.is_empty() => break,
				Err(err) => return Err(err),
			}
		}
		Ok(results)
	}

	/// Fails every blocked pull with [`QueueError::WaitCancelled`]. Used
	/// during shutdown; queued values are untouched.
	pub fn cancel_waiters(&self) {
		self.available.cancel_all();
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.values().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.values().is_empty()
	}
}
