#![allow(dead_code)]
//! Mock servers for the integration tests.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fetch_styles::runtime::Runtime;

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the mock server ends the exchange after the response.
#[derive(Debug, Clone, Copy)]
pub enum Ending {
    /// Orderly close (FIN).
    Close,
    /// Pause, then abort the connection (RST).
    Reset,
}

/// A server accepting exactly one connection.
pub struct MockServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<u8>>,
}

impl MockServer {
    pub fn start(response: Vec<u8>, chunk: usize, ending: Ending) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut stream = accept(&listener);
            let request = read_request(&mut stream);
            for part in response.chunks(chunk.max(1)) {
                stream.write_all(part).unwrap();
            }
            stream.flush().unwrap();
            if let Ending::Reset = ending {
                thread::sleep(Duration::from_millis(100));
                abort(&stream);
            }
            request
        });
        MockServer { addr, handle }
    }

    pub fn replying(response: &[u8]) -> MockServer {
        MockServer::start(response.to_vec(), response.len(), Ending::Close)
    }

    /// The bytes the client sent.
    pub fn request(self) -> Vec<u8> {
        self.handle.join().unwrap()
    }
}

/// An address where nothing listens.
pub fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Whether this kernel and sandbox let us build an io_uring event loop.
pub fn uring_available() -> bool {
    match Runtime::new() {
        Ok(_) => true,
        Err(e) => {
            eprintln!("io_uring unavailable, skipping event loop styles: {}", e);
            false
        }
    }
}

/// Waits for one client, giving up after `ACCEPT_TIMEOUT` so a client that
/// never connects fails the test instead of hanging it.
fn accept(listener: &TcpListener) -> TcpStream {
    listener.set_nonblocking(true).unwrap();
    let deadline = Instant::now() + ACCEPT_TIMEOUT;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false).unwrap();
                return stream;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    panic!("no client connected within {:?}", ACCEPT_TIMEOUT);
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => panic!("accept failed: {}", e),
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut request = Vec::new();
    let mut buf = [0u8; 256];
    while !request.ends_with(b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => request.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => panic!("read error: {}", e),
        }
    }
    request
}

/// Sets SO_LINGER to zero so closing the socket sends RST.
fn abort(stream: &TcpStream) {
    let linger = libc::linger {
        l_onoff: 1,
        l_linger: 0,
    };
    let ret = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    assert_eq!(ret, 0, "setsockopt(SO_LINGER) failed");
}
