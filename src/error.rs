use io_uring::squeue::PushError;
use std::io;
use thiserror::Error;

/// Terminal failure of one fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid target {input:?}: {reason}")]
    InvalidTarget { input: String, reason: String },
    #[error("failed to resolve host {host}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to connect to {host}: all {attempts} candidate addresses failed")]
    AllConnectionsFailed {
        host: String,
        attempts: usize,
        #[source]
        source: io::Error,
    },
    #[error("transfer failed")]
    Transfer(#[source] io::Error),
    #[error("event loop error")]
    Runtime(#[from] RuntimeError),
    #[error("failed to start worker thread")]
    Spawn(#[source] io::Error),
}

impl FetchError {
    pub(crate) fn invalid_target(input: &str, reason: impl ToString) -> Self {
        FetchError::InvalidTarget {
            input: input.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn all_failed(host: &str, attempts: usize, last: Option<io::Error>) -> Self {
        FetchError::AllConnectionsFailed {
            host: host.to_owned(),
            attempts,
            source: last.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "no candidate addresses")
            }),
        }
    }
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Error submitting event to submission queue {0}")]
    Push(#[from] PushError),
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("no runtime is running on this thread")]
    NoRuntime,
    #[error("tasks are pending but no io is in flight to wake them")]
    Stalled,
    #[error("runtime has already run")]
    Stopped,
}

/// The producer went away without handing over a result.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("result was abandoned before it was set")]
pub struct Abandoned;
