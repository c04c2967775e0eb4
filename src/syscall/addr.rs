use std::mem;
use std::net::SocketAddr;

/// Write a SocketAddr into a sockaddr_storage, return the address length.
pub(crate) fn socket_addr_to_sockaddr(
    addr: SocketAddr,
    storage: &mut libc::sockaddr_storage,
) -> libc::socklen_t {
    // Zero the storage to avoid uninitialised padding bytes.
    *storage = unsafe { mem::zeroed() };
    match addr {
        SocketAddr::V4(v4) => {
            let sa = storage as *mut _ as *mut libc::sockaddr_in;
            unsafe {
                (*sa).sin_family = libc::AF_INET as libc::sa_family_t;
                (*sa).sin_port = v4.port().to_be();
                (*sa).sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            }
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
        }
        SocketAddr::V6(v6) => {
            let sa = storage as *mut _ as *mut libc::sockaddr_in6;
            unsafe {
                (*sa).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                (*sa).sin6_port = v6.port().to_be();
                (*sa).sin6_flowinfo = v6.flowinfo();
                (*sa).sin6_addr.s6_addr = v6.ip().octets();
                (*sa).sin6_scope_id = v6.scope_id();
            }
            mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

    #[test]
    fn v4_is_network_order() {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8080));
        let len = socket_addr_to_sockaddr(addr, &mut storage);

        assert_eq!(len as usize, mem::size_of::<libc::sockaddr_in>());
        let sa = unsafe { &*(&storage as *const _ as *const libc::sockaddr_in) };
        assert_eq!(sa.sin_family as libc::c_int, libc::AF_INET);
        assert_eq!(u16::from_be(sa.sin_port), 8080);
        assert_eq!(sa.sin_addr.s_addr.to_ne_bytes(), [127, 0, 0, 1]);
    }

    #[test]
    fn v6_keeps_scope() {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 80, 0, 3));
        let len = socket_addr_to_sockaddr(addr, &mut storage);

        assert_eq!(len as usize, mem::size_of::<libc::sockaddr_in6>());
        let sa = unsafe { &*(&storage as *const _ as *const libc::sockaddr_in6) };
        assert_eq!(sa.sin6_family as libc::c_int, libc::AF_INET6);
        assert_eq!(u16::from_be(sa.sin6_port), 80);
        assert_eq!(sa.sin6_addr.s6_addr, Ipv6Addr::LOCALHOST.octets());
        assert_eq!(sa.sin6_scope_id, 3);
    }
}
