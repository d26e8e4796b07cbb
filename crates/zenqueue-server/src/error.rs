use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
	#[error("failed to bind {addr}: {source}")]
	Bind { addr: String, source: std::io::Error },

	#[error("accept failed: {0}")]
	Accept(std::io::Error),

	#[error("http server error: {0}")]
	Http(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
