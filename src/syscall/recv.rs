use io_uring::{opcode, squeue::Entry, types::Fd};
use std::marker::PhantomData;
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use crate::syscall::SysCall;

pub(crate) fn recv_entry(stream: &TcpStream, buf: &mut [u8]) -> Entry {
    opcode::Recv::new(Fd(stream.as_raw_fd()), buf.as_mut_ptr(), buf.len() as u32).build()
}

pub struct Recv<'a> {
    buf: PhantomData<&'a mut [u8]>,
}

impl<'a> Recv<'a> {
    /// Resolves to the number of bytes read; 0 means the peer closed.
    pub fn submit(buf: &'a mut [u8], stream: &'a TcpStream) -> SysCall<Recv<'a>> {
        let entry = recv_entry(stream, buf);
        SysCall::from_entry(entry, Recv { buf: PhantomData })
    }
}
