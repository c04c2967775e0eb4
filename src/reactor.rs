use io_uring::{squeue::Entry, IoUring};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, error, trace};

use crate::error::RuntimeError;

const RING_ENTRIES: u32 = 8;

/// Invoked with the raw completion result: a value `>= 0` or `-errno`.
pub type Callback = Box<dyn FnOnce(i32) + Send + 'static>;

pub type ReactorSender = Sender<(Entry, Callback)>;

/// Owns the io_uring instance and maps each completion back to the callback
/// registered with its entry.
pub struct Reactor {
    iouring: IoUring,
    events: HashMap<u64, Callback>,
    user_data: u64,
    receiver: Receiver<(Entry, Callback)>,
}

impl Reactor {
    pub fn new() -> Result<(Reactor, ReactorSender), RuntimeError> {
        let iouring = IoUring::new(RING_ENTRIES)?;
        let (tx, receiver) = channel();

        let reactor = Reactor {
            iouring,
            events: HashMap::new(),
            user_data: 0,
            receiver,
        };

        Ok((reactor, tx))
    }

    /// Submits everything registered since the last tick, then waits for and
    /// dispatches completions.
    ///
    /// Returns false when nothing was in flight, in which case it did not block.
    pub fn tick(&mut self) -> Result<bool, RuntimeError> {
        while let Ok((entry, callback)) = self.receiver.try_recv() {
            let user_data = self.user_data;
            debug!("Submitting entry {} to io uring", user_data);
            let entry = entry.user_data(user_data);
            unsafe {
                self.iouring.submission().push(&entry)?;
            }
            self.events.insert(user_data, callback);
            self.user_data += 1;
        }

        if self.events.is_empty() {
            return Ok(false);
        }

        trace!("Reactor has {} events in flight", self.events.len());
        match self.iouring.submit_and_wait(1) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => return Err(e.into()),
        }

        let completed_entries: Vec<(u64, i32)> = self
            .iouring
            .completion()
            .map(|cqe| (cqe.user_data(), cqe.result()))
            .collect();

        debug!("Consumed {} entries in 1 tick", completed_entries.len());

        for (user_data, ret) in completed_entries {
            debug!("Got completion for entry {}: {}", user_data, ret);

            if let Some(callback) = self.events.remove(&user_data) {
                (callback)(ret)
            } else {
                error!(
                    "got completion event from unknown submission: {}",
                    user_data
                );
            }
        }

        Ok(true)
    }
}
