use io_uring::{opcode, squeue::Entry};
use std::cell::RefCell;
use std::future::Future;
use std::thread_local;
use tracing::{trace, warn};

use crate::error::RuntimeError;
use crate::executor::{new_executor_and_spawner, Executor, Spawner};
use crate::reactor::{Reactor, ReactorSender};

pub use crate::reactor::Callback;

thread_local!(static REACTOR: RefCell<Option<ReactorSender>> = RefCell::new(None));

/// Queues `entry` on this thread's reactor; `callback` runs with its result.
pub(crate) fn register(entry: Entry, callback: Callback) -> Result<(), RuntimeError> {
    REACTOR.with(move |handle| match &*handle.borrow() {
        Some(sender) => sender
            .send((entry, callback))
            .map_err(|_| RuntimeError::NoRuntime),
        None => Err(RuntimeError::NoRuntime),
    })
}

/// Runs `callback` on a later turn of the loop.
pub fn post(callback: Callback) -> Result<(), RuntimeError> {
    register(opcode::Nop::new().build(), callback)
}

/// A single-threaded event loop: an executor for futures plus an io_uring
/// reactor for completions.
pub struct Runtime {
    executor: Executor,
    reactor: Reactor,
    spawner: Option<Spawner>,
}

impl Runtime {
    /// Creates a runtime bound to the current thread.
    pub fn new() -> Result<Runtime, RuntimeError> {
        let (reactor, reactor_sender) = Reactor::new()?;
        let (executor, spawner) = new_executor_and_spawner();

        REACTOR.with(move |handle| {
            handle.replace(Some(reactor_sender));
        });

        Ok(Runtime {
            reactor,
            executor,
            spawner: Some(spawner),
        })
    }

    /// Runs until no task is alive and no io is in flight.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        // Once our spawner is gone, only live tasks keep the executor open.
        drop(self.spawner.take());

        loop {
            trace!("tick");
            let tasks_alive = self.executor.tick();
            let io_in_flight = self.reactor.tick()?;
            if !io_in_flight {
                if tasks_alive {
                    warn!("tasks are still pending but nothing can wake them");
                    return Err(RuntimeError::Stalled);
                }
                return Ok(());
            }
        }
    }

    /// Queues `future` for the next `run`; fails once the runtime has run.
    pub fn spawn(
        &mut self,
        future: impl Future<Output = ()> + 'static + Send,
    ) -> Result<(), RuntimeError> {
        match &self.spawner {
            Some(spawner) => {
                spawner.spawn(future);
                Ok(())
            }
            None => Err(RuntimeError::Stopped),
        }
    }

    pub fn block_on(
        &mut self,
        future: impl Future<Output = ()> + 'static + Send,
    ) -> Result<(), RuntimeError> {
        self.spawn(future)?;
        self.run()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.executor.shutdown();
        let _ = REACTOR.try_with(|handle| handle.replace(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn runtime() -> Option<Runtime> {
        match Runtime::new() {
            Ok(rt) => Some(rt),
            Err(e) => {
                eprintln!("skipping, io_uring unavailable: {}", e);
                None
            }
        }
    }

    #[test]
    fn register_without_runtime_fails() {
        let result = std::thread::spawn(|| post(Box::new(|_| {})))
            .join()
            .unwrap();
        assert!(matches!(result, Err(RuntimeError::NoRuntime)));
    }

    #[test]
    fn posted_callbacks_run_and_can_chain() {
        let mut rt = match runtime() {
            Some(rt) => rt,
            None => return,
        };
        let seen = Arc::new(AtomicI32::new(0));
        let outer = Arc::clone(&seen);
        post(Box::new(move |ret| {
            outer.fetch_add(1 + ret, Ordering::SeqCst);
            let inner = Arc::clone(&outer);
            post(Box::new(move |ret| {
                inner.fetch_add(10 + ret, Ordering::SeqCst);
            }))
            .unwrap();
        }))
        .unwrap();

        rt.run().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn stalled_task_is_reported() {
        let mut rt = match runtime() {
            Some(rt) => rt,
            None => return,
        };
        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        let result = rt.block_on(async move {
            let _ = rx.await;
        });
        assert!(matches!(result, Err(RuntimeError::Stalled)));
        drop(tx);
    }

    #[test]
    fn spawn_after_run_is_refused() {
        let mut rt = match runtime() {
            Some(rt) => rt,
            None => return,
        };
        rt.run().unwrap();
        assert!(matches!(rt.spawn(async {}), Err(RuntimeError::Stopped)));
        assert!(matches!(rt.block_on(async {}), Err(RuntimeError::Stopped)));
    }

    #[test]
    fn dropping_a_stalled_runtime_releases_its_tasks() {
        let mut rt = match runtime() {
            Some(rt) => rt,
            None => return,
        };
        let (promise, pending) = crate::handoff::handoff::<u32>();
        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        let result = rt.block_on(async move {
            let _ = rx.await;
            promise.fulfill(1);
        });
        assert!(matches!(result, Err(RuntimeError::Stalled)));

        drop(rt);
        assert_eq!(pending.wait(), Err(crate::error::Abandoned));
        drop(tx);
    }
}
