use io_uring::{opcode, types::Fd};
use std::net::TcpStream;
use std::os::unix::io::IntoRawFd;

use crate::syscall::SysCall;

pub struct Close;

impl Close {
    /// Hands the socket's fd to the ring, which closes it.
    pub fn submit(socket: TcpStream) -> SysCall<Close> {
        let entry = opcode::Close::new(Fd(socket.into_raw_fd())).build();
        SysCall::from_entry(entry, Close)
    }
}
