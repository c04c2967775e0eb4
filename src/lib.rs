//! Fetch the root page of one host, three ways.
//!
//! The same resolve, connect, send, read-until-close sequence is written as
//! blocking code on a worker thread ([`fetch::Blocking`]), as a callback
//! chain on an io_uring event loop ([`fetch::Callback`]), and as an `async fn`
//! on that same loop ([`fetch::Coroutine`]). Each hands its result back through
//! a one-shot [`handoff`].

pub mod cli;
pub mod error;
pub mod fetch;
pub mod handoff;
pub mod resolve;
pub mod runtime;
pub mod syscall;
pub mod target;

mod executor;
mod reactor;

pub use error::{Abandoned, FetchError, RuntimeError};
pub use fetch::{Fetch, FetchConfig, FetchResult, ReadPolicy};
pub use resolve::{Resolve, StaticResolver, SystemResolver};
pub use target::Target;
