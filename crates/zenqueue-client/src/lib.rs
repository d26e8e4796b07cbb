//! Client runtime for the ZenQueue wire protocol.
//!
//! A [`QueueClient`] owns one TCP connection and is safe to share between
//! any number of concurrent in-process callers: calls are serialized onto
//! the socket in arrival order by a connection actor, so exactly one
//! request is in flight at a time and every caller receives the response
//! to its own request.
//!
//! The [`blocking`] module wraps the same runtime for callers outside an
//! async context.

pub mod blocking;
pub mod error;

mod actor;
mod client;

pub use client::QueueClient;
pub use error::ClientError;
