use std::io;
use thiserror::Error;

pub type IrcResult<T> = Result<T, IrcError>;

#[derive(Debug, Error)]
pub enum IrcError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("malformed line: {0}")]
    Protocol(String),

    #[error("timeout waiting for {0}")]
    Timeout(&'static str),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
