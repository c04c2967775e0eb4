use io_uring::{opcode, squeue::Entry, types::Fd};
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, FromRawFd};

use crate::syscall::{socket_addr_to_sockaddr, SysCall};

/// Creates an unconnected TCP socket for `addr`'s family.
pub(crate) fn open_socket(addr: &SocketAddr) -> io::Result<TcpStream> {
    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };
    let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // The stream owns the fd from here on and closes it on drop.
    Ok(unsafe { TcpStream::from_raw_fd(fd) })
}

/// `storage` must stay put until the entry completes.
pub(crate) fn connect_entry(
    stream: &TcpStream,
    addr: SocketAddr,
    storage: &mut libc::sockaddr_storage,
) -> Entry {
    let len = socket_addr_to_sockaddr(addr, storage);
    opcode::Connect::new(
        Fd(stream.as_raw_fd()),
        storage as *const _ as *const libc::sockaddr,
        len,
    )
    .build()
}

pub struct Connect {
    _addr: Box<libc::sockaddr_storage>,
}

impl Connect {
    /// Opens a socket and starts connecting it to `addr`.
    pub fn submit(addr: SocketAddr) -> io::Result<(TcpStream, SysCall<Connect>)> {
        let stream = open_socket(&addr)?;
        let mut storage: Box<libc::sockaddr_storage> = Box::new(unsafe { mem::zeroed() });
        let entry = connect_entry(&stream, addr, &mut storage);
        let future = SysCall::from_entry(entry, Connect { _addr: storage });
        Ok((stream, future))
    }
}
