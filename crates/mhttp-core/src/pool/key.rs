use crate::error::{HttpError, Result};
use crate::transport::LinkFlags;

/// Key used to index idle links.
///
/// Two requests may share a link only when they go to the same host and port
/// with the same capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub flags: LinkFlags,
}

impl PoolKey {
    pub fn new(host: impl Into<String>, port: u16, flags: LinkFlags) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
            flags,
        }
    }

    /// Construct a key from a URL string.
    pub fn from_url(url: &str, flags: LinkFlags) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".into(),
        })?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "missing port and unknown default".into(),
            })?;
        Ok(Self::new(host, port, flags))
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.flags.via_proxy {
            write!(f, " (proxy)")?;
        }
        Ok(())
    }
}
