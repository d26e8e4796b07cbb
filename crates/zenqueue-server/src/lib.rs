//! ZenQueue server: the native line-protocol listener, the HTTP adapter,
//! and the `zenqueued` binary's configuration.
//!
//! Both transports dispatch into the same shared [`zenqueue::Queue`]
//! through the [`dispatch`] module, so argument handling and the error
//! status vocabulary are identical across them.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod listener;

pub use config::Config;
pub use error::ServerError;
pub use listener::Server;
