//! Peer addressing and the HTTP transport used to fetch peer chains.

use crate::blockchain::ChainResponse;
use crate::consensus::ChainSource;
use crate::error::LedgerError;
use reqwest::Url;
use std::time::Duration;

/// Default timeout for a single chain fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest chain response body accepted from a peer.
pub const MAX_CHAIN_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

fn invalid_address(address: &str, reason: &str) -> LedgerError {
    LedgerError::Validation(format!("Invalid peer address {:?}: {}", address, reason))
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Reduces a peer address to its canonical `host:port` form.
///
/// Accepts full `http`/`https` URLs (`http://10.0.0.2:5000/anything`) as well
/// as bare `host:port` pairs. A URL without an explicit port gets its scheme's
/// default; a bare pair must name its port.
pub fn normalize_peer_address(address: &str) -> Result<String, LedgerError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation("Peer address is empty".to_string()));
    }
    if trimmed.starts_with('/') {
        return Err(invalid_address(trimmed, "no host"));
    }

    let url = if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|e| invalid_address(trimmed, &e.to_string()))?;
        if !is_web_scheme(url.scheme()) {
            return Err(invalid_address(trimmed, "unsupported scheme"));
        }
        url
    } else {
        // `http:5000` and friends are a scheme missing its slashes, not a host.
        if let Some((prefix, _)) = trimmed.split_once(':') {
            if is_web_scheme(prefix) {
                return Err(invalid_address(trimmed, "malformed URL"));
            }
        }
        let authority = trimmed.split(['/', '?', '#']).next().unwrap_or_default();
        let has_port = authority
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
        if !has_port {
            return Err(invalid_address(trimmed, "expected host:port"));
        }
        Url::parse(&format!("http://{}", trimmed))
            .map_err(|e| invalid_address(trimmed, &e.to_string()))?
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty() && !is_web_scheme(h))
        .ok_or_else(|| invalid_address(trimmed, "no host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid_address(trimmed, "no port"))?;

    Ok(format!("{}:{}", host, port))
}

/// Fetches `GET http://{peer}/chain` with a bounded timeout and body size.
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    http_client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            max_body_bytes: MAX_CHAIN_RESPONSE_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn oversized(&self, peer: &str) -> LedgerError {
        LedgerError::Network(format!(
            "response from {} exceeds {} bytes",
            peer, self.max_body_bytes
        ))
    }
}

impl Default for HttpChainSource {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, LedgerError> {
        let url = format!("http://{}/chain", peer);

        let mut response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Network(format!("request to {} timed out: {}", peer, e))
            } else if e.is_connect() {
                LedgerError::Network(format!("connection to {} failed: {}", peer, e))
            } else {
                LedgerError::Network(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "{} answered with status {}",
                peer,
                response.status()
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(self.oversized(peer));
        }

        // Content-Length may be absent (chunked) or wrong, so count as we read.
        let mut buf = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LedgerError::Network(format!("reading body from {}: {}", peer, e)))?
        {
            if buf.len() + chunk.len() > self.max_body_bytes {
                return Err(self.oversized(peer));
            }
            buf.extend_from_slice(&chunk);
        }

        let body = String::from_utf8(buf)
            .map_err(|e| LedgerError::Codec(format!("body from {} is not UTF-8: {}", peer, e)))?;
        ChainResponse::from_json(&body)
    }
}
