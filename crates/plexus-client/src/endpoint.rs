//! Normalized endpoint addresses.

use std::fmt;

use crate::error::{ClientError, Result};

/// A WebSocket URL. Addresses without a scheme get the configured default.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(String);

impl Endpoint {
    /// Normalize `address`, prefixing `default_scheme://` when it has no scheme.
    pub fn parse(address: &str, default_scheme: &str) -> Result<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidEndpoint(address.to_owned()));
        }
        match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                if scheme.is_empty() || rest.is_empty() {
                    return Err(ClientError::InvalidEndpoint(address.to_owned()));
                }
                Ok(Self(trimmed.to_owned()))
            }
            None => Ok(Self(format!("{default_scheme}://{trimmed}"))),
        }
    }

    /// The full URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme part (`ws`, `wss`, `memory`, ...).
    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map_or("", |(scheme, _)| scheme)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
