use std::net::IpAddr;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client as ReqwestClient;
use thiserror::Error;
use url::{Host, Url};

use crate::config::FetchConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL resolves to a private or reserved address: {0}")]
    BlockedHost(String),

    #[error("Could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upstream responded with {status_line}")]
    Status { status: u16, status_line: String },

    #[error("Redirect not followed: {0}")]
    Redirect(String),

    #[error("Upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Failed to fetch URL: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Upstream returned non-HTML content: {0}")]
    UnexpectedContentType(String),
}

/// A fetched page, buffered in full.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub body: String,
    /// URL after redirects; relative links resolve against this.
    pub final_url: Url,
    pub content_type: Option<String>,
}

/// Single-attempt page fetcher: no retries, redirects followed by hand.
/// Cheap to clone: the reqwest client is a shared connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: ReqwestClient,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );

        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(Policy::none())
            .build()?;

        Ok(Fetcher { client, config })
    }

    /// GET `target` and buffer its body.
    ///
    /// Fails before touching the network when `target` is not an absolute
    /// http(s) URL. Redirects are followed here rather than by the client so
    /// that every hop passes the private-address guard. The timeout bounds
    /// the whole chain, not each hop.
    pub async fn fetch(&self, target: &str) -> Result<RawPage, FetchError> {
        let mut url = parse_target(target)?;
        let deadline = Instant::now() + self.config.timeout;
        let mut hops = 0;

        let mut response = loop {
            self.check_host(&url).await?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::Timeout(self.config.timeout));
            }

            tracing::debug!(url = %url, hop = hops, "Fetching page for preview");

            let response = self
                .client
                .get(url.clone())
                .timeout(remaining)
                .send()
                .await
                .map_err(|e| self.classify(e, &url))?;

            let location = match redirect_location(&response) {
                Some(location) => location,
                None => break response,
            };

            if hops >= self.config.max_redirects {
                tracing::warn!(url = %url, hops, "Redirect limit exceeded");
                return Err(FetchError::Redirect(format!(
                    "more than {} redirects",
                    self.config.max_redirects
                )));
            }

            url = next_hop(&url, &location)?;
            hops += 1;
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                status_line: status.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = content_type.as_deref() {
            if !is_markup(ct) {
                return Err(FetchError::UnexpectedContentType(ct.to_string()));
            }
        }

        let limit = self.config.max_body_bytes;
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.classify(e, &url))?
        {
            let remaining = limit.saturating_sub(buf.len());
            if chunk.len() >= remaining {
                buf.extend_from_slice(&chunk[..remaining]);
                tracing::debug!(url = %url, limit, "Response body truncated");
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(RawPage {
            body: String::from_utf8_lossy(&buf).into_owned(),
            final_url: url,
            content_type,
        })
    }

    async fn check_host(&self, url: &Url) -> Result<(), FetchError> {
        if self.config.allow_private_hosts {
            return Ok(());
        }
        let trusted = url.host_str().is_some_and(|host| {
            self.config
                .trusted_hosts
                .iter()
                .any(|t| t.eq_ignore_ascii_case(host))
        });
        if trusted {
            return Ok(());
        }
        guard_host(url).await
    }

    fn classify(&self, e: reqwest::Error, url: &Url) -> FetchError {
        if e.is_timeout() {
            tracing::warn!(url = %url, timeout = ?self.config.timeout, "Upstream timed out");
            FetchError::Timeout(self.config.timeout)
        } else {
            tracing::warn!(error = ?e, url = %url, "Failed to fetch URL for preview");
            FetchError::Transport(e)
        }
    }
}

fn parse_target(target: &str) -> Result<Url, FetchError> {
    let url = Url::parse(target).map_err(|e| FetchError::InvalidUrl(format!("{target}: {e}")))?;
    check_scheme_and_host(&url).map_err(FetchError::InvalidUrl)?;
    Ok(url)
}

fn check_scheme_and_host(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err("Only http/https URLs are supported".into()),
    }
    if url.host().is_none() {
        return Err("URL has no host".into());
    }
    Ok(())
}

/// `Location` of a 3xx response, if it carries one. A redirect status
/// without a usable `Location` is handled like any other non-2xx status.
fn redirect_location(response: &reqwest::Response) -> Option<String> {
    if !response.status().is_redirection() {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve a `Location` value against the URL that returned it.
fn next_hop(current: &Url, location: &str) -> Result<Url, FetchError> {
    let next = current
        .join(location)
        .map_err(|e| FetchError::Redirect(format!("bad Location {location:?}: {e}")))?;
    check_scheme_and_host(&next)
        .map_err(|reason| FetchError::Redirect(format!("{next}: {reason}")))?;
    Ok(next)
}

/// Reject targets pointing at loopback, private, or link-local addresses.
async fn guard_host(url: &Url) -> Result<(), FetchError> {
    let ips: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(v4)) => vec![IpAddr::V4(v4)],
        Some(Host::Ipv6(v6)) => vec![IpAddr::V6(v6)],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|source| FetchError::Resolve {
                    host: domain.to_string(),
                    source,
                })?
                .map(|addr| addr.ip())
                .collect()
        }
        None => return Err(FetchError::InvalidUrl("URL has no host".into())),
    };

    match ips.into_iter().find(|ip| is_private_ip(*ip)) {
        Some(ip) => Err(FetchError::BlockedHost(ip.to_string())),
        None => Ok(()),
    }
}

/// Returns `true` if `ip` is a private, loopback, link-local, shared (CGNAT),
/// multicast, reserved or unspecified address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(
                o,
                [127, ..]
                    | [10, ..]
                    | [169, 254, ..]
                    | [192, 168, ..]
                    | [0, ..]
                    | [255, 255, 255, 255]
            ) || (o[0] == 172 && (16..=31).contains(&o[1]))
                // CGNAT 100.64.0.0/10
                || (o[0] == 100 && (64..=127).contains(&o[1]))
                // multicast 224.0.0.0/4 and reserved 240.0.0.0/4
                || o[0] >= 224
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
        }
    }
}

/// Whether a `Content-Type` value is something the HTML parser can make sense of.
fn is_markup(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_loopback_ipv4() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("127.255.255.255".parse().unwrap()));
    }

    #[test]
    fn blocks_private_ranges() {
        assert!(is_private_ip("10.0.0.1".parse().unwrap()));
        assert!(is_private_ip("172.16.0.1".parse().unwrap()));
        assert!(is_private_ip("172.31.255.255".parse().unwrap()));
        assert!(is_private_ip("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn blocks_link_local() {
        assert!(is_private_ip("169.254.0.1".parse().unwrap()));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
    }

    #[test]
    fn blocks_ipv6_loopback_and_mapped() {
        assert!(is_private_ip("::1".parse().unwrap()));
        assert!(is_private_ip("::".parse().unwrap()));
        assert!(is_private_ip("::ffff:10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn blocks_shared_multicast_and_reserved() {
        assert!(is_private_ip("100.64.0.1".parse().unwrap()));
        assert!(is_private_ip("100.127.255.254".parse().unwrap()));
        assert!(is_private_ip("224.0.0.1".parse().unwrap()));
        assert!(is_private_ip("239.255.255.250".parse().unwrap()));
        assert!(is_private_ip("240.0.0.1".parse().unwrap()));
        assert!(is_private_ip("ff02::1".parse().unwrap()));
        assert!(!is_private_ip("100.63.255.255".parse().unwrap()));
        assert!(!is_private_ip("100.128.0.1".parse().unwrap()));
        assert!(!is_private_ip("223.255.255.255".parse().unwrap()));
    }

    #[test]
    fn next_hop_resolves_relative_location() {
        let current = Url::parse("https://example.com/s/abc").unwrap();
        let next = next_hop(&current, "/web/share?id=1").unwrap();
        assert_eq!(next.as_str(), "https://example.com/web/share?id=1");
    }

    #[test]
    fn next_hop_rejects_non_http_location() {
        let current = Url::parse("https://example.com/").unwrap();
        assert!(matches!(
            next_hop(&current, "file:///etc/passwd"),
            Err(FetchError::Redirect(_))
        ));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip("172.32.0.1".parse().unwrap()));
        assert!(!is_private_ip("2606:4700:4700::1111".parse().unwrap()));
    }

    #[test]
    fn rejects_relative_target() {
        assert!(matches!(
            parse_target("/just/a/path"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_target("not-a-url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(
            parse_target("ftp://example.com/file"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_target("javascript:alert(1)"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn accepts_share_link() {
        let url = parse_target("https://www.terabox.com/s/1AbCdEf").unwrap();
        assert_eq!(url.host_str(), Some("www.terabox.com"));
    }

    #[test]
    fn markup_content_types() {
        assert!(is_markup("text/html; charset=utf-8"));
        assert!(is_markup("TEXT/HTML"));
        assert!(is_markup("application/xhtml+xml"));
        assert!(is_markup("text/plain"));
        assert!(!is_markup("image/png"));
        assert!(!is_markup("application/json"));
        assert!(!is_markup("application/octet-stream"));
    }

    #[tokio::test]
    async fn invalid_target_fails_without_network() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn loopback_literal_is_blocked_by_default() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::BlockedHost(_)));
    }
}
