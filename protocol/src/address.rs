//! `host:port` / `:port` / `port` address parsing, shared by both CLIs.

use thiserror::Error;

#[derive(Error, Debug)]
#[error("unknown address format: {0:?}")]
pub struct AddressError(pub String);

/// Parses `host:port`, `:port`, or bare `port`. An empty host means
/// wildcard/bind-all on the server side.
pub fn parse_address(s: &str) -> Result<(String, u16), AddressError> {
    if let Some((host, port)) = s.rsplit_once(':') {
        if !host.is_empty() {
            let port: u16 = port.parse().map_err(|_| AddressError(s.to_string()))?;
            return Ok((host.to_string(), port));
        }
        let port: u16 = port.parse().map_err(|_| AddressError(s.to_string()))?;
        return Ok((String::new(), port));
    }
    let port: u16 = s.parse().map_err(|_| AddressError(s.to_string()))?;
    Ok((String::new(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_port() {
        assert_eq!(parse_address("h:42").unwrap(), ("h".to_string(), 42));
    }

    #[test]
    fn colon_port_only() {
        assert_eq!(parse_address(":42").unwrap(), (String::new(), 42));
    }

    #[test]
    fn bare_port() {
        assert_eq!(parse_address("42").unwrap(), (String::new(), 42));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_address("bad").is_err());
    }
}
