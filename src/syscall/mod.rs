use io_uring::squeue::Entry;
use std::future::Future;
use std::io::{Error, ErrorKind};
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use tracing::warn;

mod addr;
mod close;
mod connect;
mod recv;
mod send;

pub use close::Close;
pub use connect::Connect;
pub use recv::Recv;
pub use send::Send;

pub(crate) use addr::socket_addr_to_sockaddr;
pub(crate) use connect::{connect_entry, open_socket};
pub(crate) use recv::recv_entry;
pub(crate) use send::send_entry;

use crate::runtime::register;

// This represents the possible states of a syscall
// submitted to io-uring
pub(crate) enum Lifecycle {
    Submitted,
    Waiting(Waker),
    Completed(i32),
    // The entry never reached a reactor.
    Detached,
}

/// Future for one io_uring entry.
///
/// `T` owns (or borrows, for its lifetime) whatever memory the entry points at.
pub struct SysCall<T> {
    state: Arc<Mutex<Lifecycle>>,
    _resources: T,
}

fn lock(state: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> SysCall<T> {
    pub(crate) fn from_entry(entry: Entry, resources: T) -> SysCall<T> {
        let state = Arc::new(Mutex::new(Lifecycle::Submitted));
        let state_clone = Arc::clone(&state);
        let registered = register(
            entry,
            Box::new(move |n: i32| {
                let previous_state = mem::replace(&mut *lock(&state_clone), Lifecycle::Completed(n));
                if let Lifecycle::Waiting(waker) = previous_state {
                    waker.wake();
                }
            }),
        );
        if let Err(e) = registered {
            warn!("could not register syscall: {}", e);
            *lock(&state) = Lifecycle::Detached;
        }
        SysCall {
            state,
            _resources: resources,
        }
    }
}

impl<T> Future for SysCall<T> {
    type Output = Result<u32, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let mut state = lock(&self.state);
        let outcome = match &*state {
            Lifecycle::Completed(ret) => Some(decode(*ret)),
            Lifecycle::Detached => Some(Err(Error::new(
                ErrorKind::Other,
                "no runtime is running on this thread",
            ))),
            Lifecycle::Waiting(waker) if waker.will_wake(cx.waker()) => return Poll::Pending,
            Lifecycle::Waiting(_) | Lifecycle::Submitted => None,
        };
        match outcome {
            Some(result) => Poll::Ready(result),
            None => {
                *state = Lifecycle::Waiting(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Result of a callback-style completion, decoded like [`SysCall`] does.
pub(crate) fn decode(ret: i32) -> Result<u32, Error> {
    if ret >= 0 {
        Ok(ret as u32)
    } else {
        Err(Error::from_raw_os_error(-ret))
    }
}
