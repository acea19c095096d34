use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the runtime, its servers and the close protocol.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("the runtime is shut down")]
    RuntimeShutdown,

    #[error("close did not complete within {timeout:?}")]
    CloseTimedOut { timeout: Duration },

    #[error("{0}")]
    InvalidState(&'static str),
}
