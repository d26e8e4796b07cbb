//! Core primitives for the ZenQueue message queue.
//!
//! The crate is transport-agnostic: it provides the waitable counter
//! ([`Semaphore`]), the FIFO [`Queue`] built on top of it, and the wire
//! vocabulary ([`protocol`]) shared by the server and the client runtime.
//! Networking lives in the `zenqueue-server` and `zenqueue-client` crates.

pub mod error;
pub mod protocol;
pub mod queue;
pub mod semaphore;

pub use error::{ProtocolError, QueueError, SemaphoreError};
pub use queue::Queue;
pub use semaphore::Semaphore;
