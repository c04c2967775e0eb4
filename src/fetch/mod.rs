//! The one operation this crate performs, resolve then connect then send then
//! read until close, written in three concurrency styles.

use std::io;
use std::sync::Arc;

use crate::error::FetchError;
use crate::handoff::Pending;
use crate::resolve::{Resolve, SystemResolver};
use crate::target::Target;

pub mod blocking;
pub mod callback;
pub mod coroutine;

pub use blocking::Blocking;
pub use callback::Callback;
pub use coroutine::Coroutine;

pub const DEFAULT_BUFFER_SIZE: usize = 1024;

pub type FetchResult = Result<Vec<u8>, FetchError>;

/// Starts a fetch and hands back the pending result.
///
/// The caller never blocks on the network, only on [`Pending::wait`].
pub trait Fetch {
    fn fetch(&self, target: Target) -> Result<Pending<FetchResult>, FetchError>;
}

/// How a read error, as opposed to a zero-length read, is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Only an orderly close ends the response.
    Strict,
    /// Any read error ends the response with whatever was received.
    Lenient,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy::Strict
    }
}

impl ReadPolicy {
    /// Decides how a failed read ends the fetch.
    pub(crate) fn on_read_error(self, err: io::Error, response: Vec<u8>) -> FetchResult {
        match self {
            ReadPolicy::Strict => Err(FetchError::Transfer(err)),
            ReadPolicy::Lenient => {
                tracing::debug!(error = %err, "read failed, treating as end of response");
                Ok(response)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub resolver: Arc<dyn Resolve>,
    pub buffer_size: usize,
    pub read_policy: ReadPolicy,
}

impl FetchConfig {
    pub fn with_resolver(mut self, resolver: impl Resolve + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }

    /// Sizes of zero are bumped to one byte.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            resolver: Arc::new(SystemResolver),
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_policy: ReadPolicy::default(),
        }
    }
}

/// Connect failures seen so far for one fetch.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    count: usize,
    last: Option<io::Error>,
}

impl Attempts {
    pub(crate) fn failed(&mut self, addr: std::net::SocketAddr, err: io::Error) {
        tracing::warn!(%addr, error = %err, "failed to connect");
        self.count += 1;
        self.last = Some(err);
    }

    pub(crate) fn exhausted(self, target: &Target) -> FetchError {
        FetchError::all_failed(target.host(), self.count, self.last)
    }
}
