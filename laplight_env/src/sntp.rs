//! One-shot SNTP client used as the boot-time time authority.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::EnvError;
use crate::feeds::TimeAuthority;

/// Default NTP server
pub const DEFAULT_NTP_SERVER: &str = "time.google.com:123";

/// Seconds between the NTP era (1900-01-01) and the Unix epoch
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

const PACKET_LEN: usize = 48;

/// LI = 0, VN = 3, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;

/// Queries a single SNTP server over UDP.
pub struct SntpClient {
    server: String,
    timeout: Duration,
}

impl SntpClient {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            timeout: Duration::from_secs(3),
        }
    }
    
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    
    async fn query(&self) -> Result<u64, EnvError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&self.server).await?;
        
        let mut request = [0u8; PACKET_LEN];
        request[0] = CLIENT_HEADER;
        socket.send(&request).await?;
        
        let mut reply = [0u8; PACKET_LEN];
        let len = socket.recv(&mut reply).await?;
        decode_reply(&reply[..len])
    }
}

impl Default for SntpClient {
    fn default() -> Self {
        Self::new(DEFAULT_NTP_SERVER)
    }
}

#[async_trait]
impl TimeAuthority for SntpClient {
    async fn fetch_time_ms(&self) -> Result<u64, EnvError> {
        let now_ms = tokio::time::timeout(self.timeout, self.query())
            .await
            .map_err(|_| EnvError::Timeout(self.timeout.as_millis() as u64))??;
        debug!("SNTP {} reports {} ms since epoch", self.server, now_ms);
        Ok(now_ms)
    }
}

/// Extracts the transmit timestamp of a server reply as Unix milliseconds.
fn decode_reply(reply: &[u8]) -> Result<u64, EnvError> {
    if reply.len() < PACKET_LEN {
        return Err(EnvError::TimeAuthority(format!(
            "short SNTP reply: {} bytes",
            reply.len()
        )));
    }
    
    let mode = reply[0] & 0x07;
    if mode != MODE_SERVER {
        return Err(EnvError::TimeAuthority(format!("unexpected SNTP mode {}", mode)));
    }
    
    // Stratum 0 is a kiss-o'-death packet
    if reply[1] == 0 {
        return Err(EnvError::TimeAuthority("kiss-o'-death from server".to_string()));
    }
    
    let secs = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]) as u64;
    let frac = u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]) as u64;
    
    let unix_secs = secs.checked_sub(NTP_UNIX_OFFSET_SECS).ok_or_else(|| {
        EnvError::TimeAuthority(format!("transmit timestamp {} predates 1970", secs))
    })?;
    
    Ok(unix_secs * 1000 + ((frac * 1000) >> 32))
}
