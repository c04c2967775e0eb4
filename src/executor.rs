use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake},
};
use std::{
    future::Future,
    mem,
    sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError},
    sync::{Arc, Mutex, PoisonError, Weak},
    task::{Context, Poll},
};
use tracing::{debug, error};

/// Maximum number of woken tasks queued at once.
const MAX_QUEUED_TASKS: usize = 10_000;

/// Every task spawned so far, so that shutdown can reach the ones that still wait.
type TaskList = Arc<Mutex<Vec<Weak<Task>>>>;

/// Task executor that receives tasks off of a channel and runs them.
pub(crate) struct Executor {
    ready_queue: Receiver<Arc<Task>>,
    tasks: TaskList,
}

impl Executor {
    /// Polls every task that is ready.
    ///
    /// Returns false once every task has finished and every spawner is gone.
    pub fn tick(&self) -> bool {
        loop {
            match self.ready_queue.try_recv() {
                Ok(task) => {
                    let mut future_slot = task.future.lock().unwrap_or_else(PoisonError::into_inner);
                    // A task woken more than once may already have finished.
                    if let Some(mut future) = future_slot.take() {
                        let waker = waker_ref(&task);
                        let context = &mut Context::from_waker(&*waker);
                        debug!("Polling future");
                        if let Poll::Pending = future.as_mut().poll(context) {
                            *future_slot = Some(future);
                        }
                    }
                }
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    /// Drops the future of every unfinished task.
    ///
    /// A waiting task is owned by the waker it left with whatever it waits on,
    /// so without this it and everything it holds would never be freed.
    pub fn shutdown(&self) {
        let tasks = mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks.iter().filter_map(Weak::upgrade) {
            let future = task.future.lock().unwrap_or_else(PoisonError::into_inner).take();
            if future.is_some() {
                debug!("Dropping unfinished task");
            }
            // Released outside the slot lock, the future may wake other tasks on drop.
            drop(future);
        }
    }
}

/// `Spawner` spawns new futures onto the task channel.
#[derive(Clone)]
pub struct Spawner {
    task_sender: SyncSender<Arc<Task>>,
    tasks: TaskList,
}

impl Spawner {
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static + Send) {
        debug!("Spawning future");
        let future = future.boxed();
        let task = Arc::new(Task {
            future: Mutex::new(Some(future)),
            task_sender: self.task_sender.clone(),
        });
        {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.retain(|task| task.strong_count() > 0);
            tasks.push(Arc::downgrade(&task));
        }
        task.schedule();
    }
}

/// A future that can reschedule itself to be polled by an `Executor`.
pub(crate) struct Task {
    /// Only one thread ever polls, the `Mutex` is there to make `Task: Sync`.
    future: Mutex<Option<BoxFuture<'static, ()>>>,

    /// Handle to place the task itself back onto the task queue.
    task_sender: SyncSender<Arc<Task>>,
}

impl Task {
    fn schedule(self: &Arc<Self>) {
        if self.task_sender.send(Arc::clone(self)).is_err() {
            error!("executor is gone, dropping task");
        }
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.schedule();
    }
}

pub(crate) fn new_executor_and_spawner() -> (Executor, Spawner) {
    let (task_sender, ready_queue) = sync_channel(MAX_QUEUED_TASKS);
    let tasks = TaskList::default();
    (
        Executor {
            ready_queue,
            tasks: Arc::clone(&tasks),
        },
        Spawner { task_sender, tasks },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_spawned_futures_and_disconnects_when_done() {
        let (executor, spawner) = new_executor_and_spawner();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            spawner.spawn(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(spawner);

        assert!(!executor.tick());
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn waiting_task_keeps_executor_alive_until_woken() {
        let (executor, spawner) = new_executor_and_spawner();
        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        spawner.spawn(async move {
            let _ = rx.await;
        });
        drop(spawner);

        assert!(executor.tick());
        drop(tx);
        assert!(!executor.tick());
    }

    #[test]
    fn shutdown_releases_waiting_tasks() {
        let (executor, spawner) = new_executor_and_spawner();
        let (_tx, rx) = futures::channel::oneshot::channel::<()>();
        let (held_tx, held_rx) = futures::channel::oneshot::channel::<()>();
        spawner.spawn(async move {
            let _held = held_tx;
            let _ = rx.await;
        });
        drop(spawner);

        assert!(executor.tick());
        executor.shutdown();
        let held = futures::executor::block_on(held_rx);
        assert_eq!(held, Err(futures::channel::oneshot::Canceled));
        assert!(!executor.tick());
    }
}
