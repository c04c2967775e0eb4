use io_uring::{opcode, squeue::Entry, types::Fd};
use std::marker::PhantomData;
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use crate::syscall::SysCall;

pub(crate) fn send_entry(stream: &TcpStream, buf: &[u8]) -> Entry {
    opcode::Send::new(Fd(stream.as_raw_fd()), buf.as_ptr(), buf.len() as u32).build()
}

pub struct Send<'a> {
    buf: PhantomData<&'a [u8]>,
}

impl<'a> Send<'a> {
    /// Resolves to the number of bytes sent, which may be less than `buf.len()`.
    pub fn submit(buf: &'a [u8], stream: &'a TcpStream) -> SysCall<Send<'a>> {
        let entry = send_entry(stream, buf);
        SysCall::from_entry(entry, Send { buf: PhantomData })
    }
}
