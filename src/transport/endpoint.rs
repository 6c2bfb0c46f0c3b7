//! # Hub endpoint address.
//!
//! An [`Endpoint`] is validated once: it must contain non-whitespace text.
//! Scheme and authority helpers cover the `scheme://host:port/path` shape the
//! bundled transports use; anything else is kept verbatim.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ClientError;

/// Immutable, validated endpoint text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Validates and wraps `raw` (surrounding whitespace is trimmed).
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidEndpoint {
                endpoint: raw.to_string(),
            });
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `tcp` in `tcp://127.0.0.1:9000/hub`.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }

    /// `127.0.0.1:9000` in `tcp://127.0.0.1:9000/hub`.
    pub fn authority(&self) -> &str {
        let rest = self.0.split_once("://").map_or(&*self.0, |(_, rest)| rest);
        rest.split(['/', '?']).next().unwrap_or(rest)
    }
}

impl FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank() {
        for raw in ["", "   ", "\t\n"] {
            let err = Endpoint::parse(raw).unwrap_err();
            assert_eq!(err.as_label(), "client_invalid_endpoint");
        }
    }

    #[test]
    fn splits_scheme_and_authority() {
        let ep: Endpoint = " tcp://127.0.0.1:9000/hub?x=1 ".parse().unwrap();
        assert_eq!(ep.as_str(), "tcp://127.0.0.1:9000/hub?x=1");
        assert_eq!(ep.scheme(), Some("tcp"));
        assert_eq!(ep.authority(), "127.0.0.1:9000");

        let bare = Endpoint::parse("localhost:1").unwrap();
        assert_eq!(bare.scheme(), None);
        assert_eq!(bare.authority(), "localhost:1");
    }
}
