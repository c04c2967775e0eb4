use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::debug;

use crate::error::FetchError;
use crate::target::Target;

/// Turns a target into the ordered list of addresses a fetch will try.
pub trait Resolve: fmt::Debug + Send + Sync {
    fn resolve(&self, target: &Target) -> io::Result<Vec<SocketAddr>>;
}

/// Resolution through the system resolver (`getaddrinfo`). Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, target: &Target) -> io::Result<Vec<SocketAddr>> {
        Ok((target.host(), target.port()).to_socket_addrs()?.collect())
    }
}

/// Always answers with the same list, whatever the target.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver(pub Vec<SocketAddr>);

impl Resolve for StaticResolver {
    fn resolve(&self, _target: &Target) -> io::Result<Vec<SocketAddr>> {
        Ok(self.0.clone())
    }
}

pub(crate) fn candidates(
    resolver: &dyn Resolve,
    target: &Target,
) -> Result<Vec<SocketAddr>, FetchError> {
    let resolution = |source| FetchError::Resolution {
        host: target.host().to_owned(),
        source,
    };
    let addrs = resolver.resolve(target).map_err(resolution)?;
    if addrs.is_empty() {
        return Err(resolution(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses found",
        )));
    }
    debug!(host = target.host(), count = addrs.len(), "resolved");
    Ok(addrs)
}
