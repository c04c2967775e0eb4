use http::uri::Authority;
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

pub const DEFAULT_PORT: u16 = 80;

/// The host a fetch talks to.
///
/// Parsed from `host` or `host:port`; IPv6 literals need brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    authority: Authority,
}

impl Target {
    /// Host name without brackets, as handed to the resolver.
    pub fn host(&self) -> &str {
        let host = self.authority.host();
        host.strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
    }

    pub fn port(&self) -> u16 {
        self.authority.port_u16().unwrap_or(DEFAULT_PORT)
    }

    /// The bytes sent once a connection is up.
    ///
    /// The space before the CRLF after the Host value is part of the wire format.
    pub fn request(&self) -> Vec<u8> {
        format!(
            "GET / HTTP/1.1\r\nHost: {} \r\nConnection: close\r\n\r\n",
            self.authority
        )
        .into_bytes()
    }
}

impl FromStr for Target {
    type Err = FetchError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(FetchError::invalid_target(input, "empty host"));
        }
        if input.contains('@') {
            return Err(FetchError::invalid_target(input, "userinfo is not allowed"));
        }
        let authority: Authority = input
            .parse()
            .map_err(|e| FetchError::invalid_target(input, e))?;
        if authority.host().is_empty() {
            return Err(FetchError::invalid_target(input, "empty host"));
        }
        Ok(Target { authority })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority)
    }
}
