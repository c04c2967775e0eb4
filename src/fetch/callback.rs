//! Callback-chained style.
//!
//! No stack survives between completions, so a [`FetchOperation`] carries
//! everything the next step needs and a [`Step`] records where it is. The
//! reactor calls [`FetchOperation::dispatch`] with each completion result;
//! dispatch performs one transition and registers itself again for the next
//! entry, until the promise is fulfilled.

use io_uring::squeue::Entry;
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::vec;
use tracing::{debug, debug_span, error};

use crate::error::FetchError;
use crate::fetch::{Attempts, Fetch, FetchConfig, FetchResult};
use crate::handoff::{handoff, Pending, SharedPromise};
use crate::resolve::candidates;
use crate::runtime::{self, Runtime};
use crate::syscall::{connect_entry, decode, open_socket, recv_entry, send_entry};
use crate::target::Target;

#[derive(Debug, Clone, Default)]
pub struct Callback {
    config: FetchConfig,
}

impl Callback {
    pub fn new(config: FetchConfig) -> Self {
        Callback { config }
    }
}

impl Fetch for Callback {
    fn fetch(&self, target: Target) -> Result<Pending<FetchResult>, FetchError> {
        let (promise, pending) = handoff();
        let config = self.config.clone();
        thread::Builder::new()
            .name("fetch-callback".into())
            .spawn(move || {
                let span = debug_span!("fetch", style = "callback", %target);
                let _guard = span.enter();
                let rt = match Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => return promise.fulfill(Err(e.into())),
                };
                drive(rt, FetchOperation::new(target, config, promise.into()));
            })
            .map_err(FetchError::Spawn)?;
        Ok(pending)
    }
}

/// Starts `op` on `rt` and runs the loop; if the loop fails before the
/// operation finished, that failure is the result.
fn drive(mut rt: Runtime, op: FetchOperation) {
    let promise = op.promise.clone();
    op.start();
    if let Err(e) = rt.run() {
        error!("event loop failed: {}", e);
        promise.fulfill(Err(e.into()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Resolving,
    Connecting,
    Sending,
    Reading,
}

/// What a step asks the loop to do next.
enum Transition {
    Submit(Entry),
    Finish(FetchResult),
}

pub(crate) struct FetchOperation {
    target: Target,
    config: FetchConfig,
    step: Step,
    candidates: vec::IntoIter<SocketAddr>,
    attempts: Attempts,
    current: Option<SocketAddr>,
    socket: Option<TcpStream>,
    // Entries point into these three; they live as long as the operation.
    addr: Box<libc::sockaddr_storage>,
    request: Vec<u8>,
    io_buffer: Vec<u8>,
    sent: usize,
    response: Vec<u8>,
    promise: SharedPromise<FetchResult>,
}

impl FetchOperation {
    fn new(target: Target, config: FetchConfig, promise: SharedPromise<FetchResult>) -> Self {
        let request = target.request();
        let io_buffer = vec![0u8; config.buffer_size];
        FetchOperation {
            target,
            config,
            step: Step::Resolving,
            candidates: Vec::new().into_iter(),
            attempts: Attempts::default(),
            current: None,
            socket: None,
            addr: Box::new(unsafe { mem::zeroed() }),
            request,
            io_buffer,
            sent: 0,
            response: Vec::new(),
            promise,
        }
    }

    /// Posts the first step to the loop running on this thread.
    fn start(self) {
        let op = Arc::new(Mutex::new(self));
        let first = Arc::clone(&op);
        if let Err(e) = runtime::post(Box::new(move |ret| FetchOperation::dispatch(&first, ret))) {
            op.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .finish(Err(e.into()));
        }
    }

    /// The only completion callback: advances the operation by one step.
    fn dispatch(op: &Arc<Mutex<FetchOperation>>, ret: i32) {
        let mut this = op.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(step = ?this.step, ret, "dispatch");
        let transition = match this.step {
            Step::Resolving => this.on_resolving(),
            Step::Connecting => this.on_connected(ret),
            Step::Sending => this.on_sent(ret),
            Step::Reading => this.on_read(ret),
        };
        match transition {
            Transition::Submit(entry) => {
                let next = Arc::clone(op);
                let registered = runtime::register(
                    entry,
                    Box::new(move |ret| FetchOperation::dispatch(&next, ret)),
                );
                if let Err(e) = registered {
                    this.finish(Err(e.into()));
                }
            }
            Transition::Finish(result) => this.finish(result),
        }
    }

    fn on_resolving(&mut self) -> Transition {
        match candidates(&*self.config.resolver, &self.target) {
            Ok(addrs) => {
                self.candidates = addrs.into_iter();
                self.connect_next()
            }
            Err(e) => Transition::Finish(Err(e)),
        }
    }

    fn connect_next(&mut self) -> Transition {
        while let Some(addr) = self.candidates.next() {
            match open_socket(&addr) {
                Ok(socket) => {
                    let entry = connect_entry(&socket, addr, &mut self.addr);
                    self.socket = Some(socket);
                    self.current = Some(addr);
                    self.step = Step::Connecting;
                    return Transition::Submit(entry);
                }
                Err(e) => self.attempts.failed(addr, e),
            }
        }
        let attempts = mem::take(&mut self.attempts);
        Transition::Finish(Err(attempts.exhausted(&self.target)))
    }

    fn on_connected(&mut self, ret: i32) -> Transition {
        if let Err(e) = decode(ret) {
            self.socket = None;
            if let Some(addr) = self.current.take() {
                self.attempts.failed(addr, e);
            }
            return self.connect_next();
        }
        debug!(addr = ?self.current, "connected");
        self.step = Step::Sending;
        self.send_rest()
    }

    fn on_sent(&mut self, ret: i32) -> Transition {
        match decode(ret) {
            Ok(0) => Transition::Finish(Err(FetchError::Transfer(io::Error::new(
                io::ErrorKind::WriteZero,
                "failed to write whole request",
            )))),
            Ok(n) => {
                self.sent += n as usize;
                if self.sent < self.request.len() {
                    self.send_rest()
                } else {
                    self.step = Step::Reading;
                    self.read_more()
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.send_rest(),
            Err(e) => Transition::Finish(Err(FetchError::Transfer(e))),
        }
    }

    fn on_read(&mut self, ret: i32) -> Transition {
        match decode(ret) {
            Ok(0) => Transition::Finish(Ok(mem::take(&mut self.response))),
            Ok(n) => {
                let n = n as usize;
                self.response.extend_from_slice(&self.io_buffer[..n]);
                self.read_more()
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.read_more(),
            Err(e) => {
                let response = mem::take(&mut self.response);
                Transition::Finish(self.config.read_policy.on_read_error(e, response))
            }
        }
    }

    fn send_rest(&mut self) -> Transition {
        match &self.socket {
            Some(socket) => Transition::Submit(send_entry(socket, &self.request[self.sent..])),
            None => Transition::Finish(Err(not_connected())),
        }
    }

    fn read_more(&mut self) -> Transition {
        match &self.socket {
            Some(socket) => Transition::Submit(recv_entry(socket, &mut self.io_buffer)),
            None => Transition::Finish(Err(not_connected())),
        }
    }

    fn finish(&mut self, result: FetchResult) {
        self.socket = None;
        self.promise.fulfill(result);
    }
}

fn not_connected() -> FetchError {
    FetchError::Transfer(io::Error::new(io::ErrorKind::NotConnected, "socket is gone"))
}
