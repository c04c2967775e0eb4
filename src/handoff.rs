//! One-shot result handoff between a worker thread and the caller.
//!
//! A [`Promise`] is written exactly once; its [`Pending`] side is read exactly
//! once, either by blocking in [`Pending::wait`] or by awaiting it.

use futures::channel::oneshot;
use futures::executor::block_on;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tracing::debug;

use crate::error::Abandoned;

pub fn handoff<T>() -> (Promise<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (Promise { sender }, Pending { receiver })
}

#[derive(Debug)]
pub struct Promise<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Promise<T> {
    pub fn fulfill(self, value: T) {
        if self.sender.send(value).is_err() {
            debug!("result dropped, nobody is waiting for it");
        }
    }
}

/// A [`Promise`] with several owners. The first `fulfill` wins, later ones are
/// ignored, and the pending side sees [`Abandoned`] only once every clone is gone.
#[derive(Debug)]
pub struct SharedPromise<T> {
    slot: Arc<Mutex<Option<Promise<T>>>>,
}

impl<T> SharedPromise<T> {
    /// Returns false when the result was already set.
    pub fn fulfill(&self, value: T) -> bool {
        let promise = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match promise {
            Some(promise) => {
                promise.fulfill(value);
                true
            }
            None => false,
        }
    }
}

impl<T> Clone for SharedPromise<T> {
    fn clone(&self) -> Self {
        SharedPromise {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> From<Promise<T>> for SharedPromise<T> {
    fn from(promise: Promise<T>) -> Self {
        SharedPromise {
            slot: Arc::new(Mutex::new(Some(promise))),
        }
    }
}

#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// Blocks until the promise is fulfilled or dropped.
    pub fn wait(self) -> Result<T, Abandoned> {
        block_on(self)
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_blocks_until_fulfilled() {
        let (promise, pending) = handoff();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.fulfill(42u32);
        });
        assert_eq!(pending.wait(), Ok(42));
        worker.join().unwrap();
    }

    #[test]
    fn dropped_promise_is_abandoned() {
        let (promise, pending) = handoff::<u32>();
        thread::spawn(move || drop(promise)).join().unwrap();
        assert_eq!(pending.wait(), Err(Abandoned));
    }

    #[test]
    fn fulfilling_without_a_reader_is_quiet() {
        let (promise, pending) = handoff();
        drop(pending);
        promise.fulfill("ignored");
    }

    #[test]
    fn first_shared_fulfill_wins() {
        let (promise, pending) = handoff();
        let shared = SharedPromise::from(promise);
        let other = shared.clone();
        let worker = thread::spawn(move || other.fulfill("worker"));
        assert!(worker.join().unwrap());
        assert!(!shared.fulfill("late"));
        assert_eq!(pending.wait(), Ok("worker"));
    }

    #[test]
    fn shared_promise_is_abandoned_after_the_last_clone() {
        let (promise, pending) = handoff::<u32>();
        let shared = SharedPromise::from(promise);
        let other = shared.clone();
        drop(shared);
        thread::spawn(move || drop(other)).join().unwrap();
        assert_eq!(pending.wait(), Err(Abandoned));
    }
}
