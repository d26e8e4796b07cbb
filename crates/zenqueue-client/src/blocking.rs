//! Thread-blocking variant of the client.
//!
//! Owns a private runtime whose single worker thread drives the
//! connection actor and the timers, and delegates every call to the async
//! [`crate::QueueClient`], so the wire behavior of the two modes is
//! identical. One instance may be shared across OS threads (e.g. behind an
//! `Arc`): calls are serialized onto the connection in arrival order, and
//! a thread blocked in a long pull does not keep other threads from
//! queueing their own calls or timing out while queued. Intended for
//! synchronous programs; inside an async context use the async client
//! directly.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::net::ToSocketAddrs;
use tokio::runtime::{Builder, Runtime};

use zenqueue::protocol::Action;

use crate::error::Result;

pub struct QueueClient {
	inner: crate::QueueClient,
	runtime: Runtime,
}

impl QueueClient {
	/// Connects to a ZenQueue server, blocking until the connection is
	/// established.
	pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
		// The worker thread drives the actor and timers; caller threads
		// only block on their own call futures.
		let runtime = Builder::new_multi_thread().worker_threads(1).enable_all().build()?;
		let inner = runtime.block_on(crate::QueueClient::connect(addr))?;
		Ok(Self { inner, runtime })
	}

	pub fn push(&self, value: Value) -> Result<()> {
		self.runtime.block_on(self.inner.push(value))
	}

	pub fn push_many(&self, values: Vec<Value>) -> Result<()> {
		self.runtime.block_on(self.inner.push_many(values))
	}

	pub fn pull(&self, timeout: Option<Duration>) -> Result<Value> {
		self.runtime.block_on(self.inner.pull(timeout))
	}

	pub fn pull_many(&self, n: Option<usize>, timeout: Option<Duration>) -> Result<Vec<Value>> {
		self.runtime.block_on(self.inner.pull_many(n, timeout))
	}

	pub fn action(&self, action: Action, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Value> {
		self.runtime.block_on(self.inner.action(action, args, kwargs))
	}

	pub fn close(&self) -> Result<()> {
		self.runtime.block_on(self.inner.close())
	}
}
