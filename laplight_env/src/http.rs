//! Minimal HTTP/1.0 client for the roster and location endpoints.
//!
//! The feed server is a plain LAN service; requests go out as HTTP/1.0
//! with `Connection: close`, so the body is simply everything after the
//! header block until EOF. No TLS, no chunked encoding, no redirects.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::EnvError;
use crate::feeds::{LocationSource, RosterSource};
use crate::types::{LocationBatch, LocationDto, RosterEntry};

/// Default per-request timeout (connect + write + read)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed form of `http://host[:port]/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl HttpUrl {
    pub fn parse(url: &str) -> Result<Self, EnvError> {
        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| EnvError::InvalidUrl(url.to_string()))?;
        
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| EnvError::InvalidUrl(url.to_string()))?;
                (host, port)
            }
            None => (authority, 80),
        };
        
        if host.is_empty() {
            return Err(EnvError::InvalidUrl(url.to_string()));
        }
        
        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

/// HTTP-backed roster and location feed.
pub struct HttpFeed {
    roster_url: String,
    locations_url: String,
    timeout: Duration,
}

impl HttpFeed {
    /// Creates a feed; URLs are validated up front so a typo fails at boot.
    pub fn new(
        roster_url: impl Into<String>,
        locations_url: impl Into<String>,
    ) -> Result<Self, EnvError> {
        let roster_url = roster_url.into();
        let locations_url = locations_url.into();
        HttpUrl::parse(&roster_url)?;
        HttpUrl::parse(&locations_url)?;
        
        Ok(Self {
            roster_url,
            locations_url,
            timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }
    
    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, EnvError> {
        let target = HttpUrl::parse(url)?;
        let raw = tokio::time::timeout(self.timeout, get(&target))
            .await
            .map_err(|_| EnvError::Timeout(self.timeout.as_millis() as u64))??;
        
        let (status, body) = split_response(&raw)?;
        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        
        if !(200..300).contains(&status) {
            return Err(EnvError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        
        Ok(serde_json::from_slice(body)?)
    }
}

#[async_trait]
impl RosterSource for HttpFeed {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, EnvError> {
        self.get_json(&self.roster_url).await
    }
}

#[async_trait]
impl LocationSource for HttpFeed {
    async fn fetch_locations(&self) -> Result<Vec<LocationDto>, EnvError> {
        let batch: LocationBatch = self.get_json(&self.locations_url).await?;
        Ok(batch.into_locations())
    }
}

/// Sends one GET and returns the raw response bytes.
async fn get(target: &HttpUrl) -> Result<Vec<u8>, EnvError> {
    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
    
    let request = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
        target.path, target.host
    );
    stream.write_all(request.as_bytes()).await?;
    
    let mut raw = Vec::with_capacity(4096);
    stream.read_to_end(&mut raw).await?;
    trace!("read {} bytes from {}:{}", raw.len(), target.host, target.port);
    Ok(raw)
}

/// Splits a raw response into its status code and body.
fn split_response(raw: &[u8]) -> Result<(u16, &[u8]), EnvError> {
    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| EnvError::decode("response has no header terminator"))?;
    
    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| EnvError::decode("response headers are not UTF-8"))?;
    let status_line = head.lines().next().unwrap_or_default();
    
    // "HTTP/1.1 200 OK"
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| EnvError::decode(format!("bad status line {:?}", status_line)))?;
    
    Ok((status, &raw[header_end + 4..]))
}
