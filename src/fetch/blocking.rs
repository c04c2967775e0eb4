//! Thread-per-call: plain blocking sockets on a dedicated worker thread.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use tracing::{debug, debug_span};

use crate::error::FetchError;
use crate::fetch::{Attempts, Fetch, FetchConfig, FetchResult};
use crate::handoff::{handoff, Pending};
use crate::resolve::candidates;
use crate::target::Target;

#[derive(Debug, Clone, Default)]
pub struct Blocking {
    config: FetchConfig,
}

impl Blocking {
    pub fn new(config: FetchConfig) -> Self {
        Blocking { config }
    }
}

impl Fetch for Blocking {
    fn fetch(&self, target: Target) -> Result<Pending<FetchResult>, FetchError> {
        let (promise, pending) = handoff();
        let config = self.config.clone();
        thread::Builder::new()
            .name("fetch-blocking".into())
            .spawn(move || {
                let span = debug_span!("fetch", style = "blocking", %target);
                let _guard = span.enter();
                promise.fulfill(fetch_blocking(&target, &config));
            })
            .map_err(FetchError::Spawn)?;
        Ok(pending)
    }
}

fn fetch_blocking(target: &Target, config: &FetchConfig) -> FetchResult {
    let mut attempts = Attempts::default();
    for addr in candidates(&*config.resolver, target)? {
        let mut stream = match TcpStream::connect(addr) {
            Ok(stream) => stream,
            Err(e) => {
                attempts.failed(addr, e);
                continue;
            }
        };
        debug!(%addr, "connected");

        stream
            .write_all(&target.request())
            .map_err(FetchError::Transfer)?;
        return read_to_close(&mut stream, config);
    }
    Err(attempts.exhausted(target))
}

fn read_to_close(stream: &mut TcpStream, config: &FetchConfig) -> FetchResult {
    let mut response = Vec::new();
    let mut buf = vec![0u8; config.buffer_size];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(response),
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return config.read_policy.on_read_error(e, response),
        }
    }
}
