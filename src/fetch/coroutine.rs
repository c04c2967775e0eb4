//! Coroutine style: the algorithm is an ordinary `async fn`, suspended at every
//! io_uring call and resumed on the loop thread when the reactor completes it.

use std::future::Future;
use std::io;
use std::net::TcpStream;
use std::thread;
use tracing::{debug, debug_span, error};
use tracing_futures::Instrument;

use crate::error::FetchError;
use crate::fetch::{Attempts, Fetch, FetchConfig, FetchResult};
use crate::handoff::{handoff, Pending, SharedPromise};
use crate::resolve::candidates;
use crate::runtime::Runtime;
use crate::syscall::{self, Close, Connect, Recv};
use crate::target::Target;

#[derive(Debug, Clone, Default)]
pub struct Coroutine {
    config: FetchConfig,
}

impl Coroutine {
    pub fn new(config: FetchConfig) -> Self {
        Coroutine { config }
    }
}

impl Fetch for Coroutine {
    fn fetch(&self, target: Target) -> Result<Pending<FetchResult>, FetchError> {
        let (promise, pending) = handoff();
        let config = self.config.clone();
        thread::Builder::new()
            .name("fetch-coroutine".into())
            .spawn(move || {
                let span = debug_span!("fetch", style = "coroutine", %target);
                let task = fetch_async(target, config).instrument(span);
                drive(task, promise.into());
            })
            .map_err(FetchError::Spawn)?;
        Ok(pending)
    }
}

/// Runs `task` on a fresh loop on this thread and hands over its result, or
/// the loop's own failure if the task never got to finish.
fn drive<F>(task: F, promise: SharedPromise<FetchResult>)
where
    F: Future<Output = FetchResult> + Send + 'static,
{
    let mut rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            promise.fulfill(Err(e.into()));
            return;
        }
    };
    let fulfiller = promise.clone();
    let outcome = rt.block_on(async move {
        fulfiller.fulfill(task.await);
    });
    if let Err(e) = outcome {
        error!("event loop failed: {}", e);
        promise.fulfill(Err(e.into()));
    }
}

async fn fetch_async(target: Target, config: FetchConfig) -> FetchResult {
    let mut attempts = Attempts::default();
    for addr in candidates(&*config.resolver, &target)? {
        let (stream, connecting) = match Connect::submit(addr) {
            Ok(submitted) => submitted,
            Err(e) => {
                attempts.failed(addr, e);
                continue;
            }
        };
        if let Err(e) = connecting.await {
            attempts.failed(addr, e);
            continue;
        }
        debug!(%addr, "connected");

        send_all(&stream, &target.request())
            .await
            .map_err(FetchError::Transfer)?;
        let response = read_to_close(&stream, &config).await?;
        if let Err(e) = Close::submit(stream).await {
            debug!(error = %e, "close failed");
        }
        return Ok(response);
    }
    Err(attempts.exhausted(&target))
}

async fn send_all(stream: &TcpStream, request: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < request.len() {
        match syscall::Send::submit(&request[sent..], stream).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole request",
                ))
            }
            Ok(n) => sent += n as usize,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn read_to_close(stream: &TcpStream, config: &FetchConfig) -> FetchResult {
    let mut response = Vec::new();
    let mut buf = vec![0u8; config.buffer_size];
    loop {
        match Recv::submit(&mut buf, stream).await {
            Ok(0) => return Ok(response),
            Ok(n) => response.extend_from_slice(&buf[..n as usize]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return config.read_policy.on_read_error(e, response),
        }
    }
}
