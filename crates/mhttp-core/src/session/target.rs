//! Where a request actually goes: origin or proxy, and what goes on the
//! request line.

use url::Url;

use crate::codec::Credentials;
use crate::error::{HttpError, Result};
use crate::pool::PoolKey;
use crate::transport::LinkFlags;

#[derive(Debug, Clone)]
pub struct Target {
    /// Host and port the link is opened to.
    pub connect_host: String,
    pub connect_port: u16,
    /// `Host` header value.
    pub host_header: String,
    /// Request-line target.
    pub path: String,
    pub key: PoolKey,
    pub credentials: Option<Credentials>,
}

/// Parse and validate a resource URL.
pub fn parse_location(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).map_err(|e| HttpError::InvalidUrl {
        url: uri.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" {
        return Err(HttpError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(HttpError::InvalidUrl {
            url: uri.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

/// Only plain `http://` proxies are used; anything else is ignored.
pub fn parse_proxy(proxy: Option<&str>) -> Option<Url> {
    let raw = proxy?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(u) if u.scheme() == "http" && u.host_str().is_some() => Some(u),
        Ok(_) | Err(_) => {
            tracing::warn!(proxy = raw, "ignoring proxy that is not an http:// URL");
            None
        }
    }
}

impl Target {
    pub fn resolve(url: &Url, proxy: Option<&Url>, less_wait: bool) -> Result<Self> {
        let host = url.host_str().ok_or_else(|| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".into(),
        })?;
        let host_header = match url.port() {
            Some(p) => format!("{host}:{p}"),
            None => host.to_string(),
        };
        let credentials = Credentials::from_url(url);
        let flags = LinkFlags {
            less_wait,
            via_proxy: proxy.is_some(),
        };

        let (connect_host, connect_port, path) = match proxy {
            Some(p) => {
                let mut absolute = url.clone();
                let _ = absolute.set_username("");
                let _ = absolute.set_password(None);
                absolute.set_fragment(None);
                (
                    p.host_str().unwrap_or_default().to_string(),
                    p.port_or_known_default().unwrap_or(80),
                    absolute.to_string(),
                )
            }
            None => {
                let mut path = url.path().to_string();
                if path.is_empty() {
                    path.push('/');
                }
                if let Some(q) = url.query() {
                    path.push('?');
                    path.push_str(q);
                }
                (
                    host.to_string(),
                    url.port_or_known_default().unwrap_or(80),
                    path,
                )
            }
        };
        let key = PoolKey::new(connect_host.clone(), connect_port, flags);
        Ok(Self {
            connect_host,
            connect_port,
            host_header,
            path,
            key,
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_target() {
        let url = parse_location("http://user:pw@media.example:8080/live/v.ts?token=1#frag").unwrap();
        let t = Target::resolve(&url, None, true).unwrap();
        assert_eq!(t.connect_host, "media.example");
        assert_eq!(t.connect_port, 8080);
        assert_eq!(t.host_header, "media.example:8080");
        assert_eq!(t.path, "/live/v.ts?token=1");
        assert!(t.key.flags.less_wait);
        assert!(!t.key.flags.via_proxy);
        assert_eq!(t.credentials.unwrap().user, "user");
    }

    #[test]
    fn proxied_target_uses_absolute_uri() {
        let url = parse_location("http://user:pw@media.example/v.ts").unwrap();
        let proxy = parse_proxy(Some("http://proxy.local:3128")).unwrap();
        let t = Target::resolve(&url, Some(&proxy), false).unwrap();
        assert_eq!(t.connect_host, "proxy.local");
        assert_eq!(t.connect_port, 3128);
        assert_eq!(t.host_header, "media.example");
        assert_eq!(t.path, "http://media.example/v.ts");
        assert!(t.key.flags.via_proxy);
    }

    #[test]
    fn rejects_other_schemes_and_bad_proxies() {
        assert!(matches!(
            parse_location("https://media.example/v.ts"),
            Err(HttpError::UnsupportedScheme(s)) if s == "https"
        ));
        assert!(matches!(parse_location("::"), Err(HttpError::InvalidUrl { .. })));
        assert!(parse_proxy(Some("socks5://p:1080")).is_none());
        assert!(parse_proxy(Some("")).is_none());
        assert!(parse_proxy(None).is_none());
    }
}
