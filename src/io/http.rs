use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};

use super::RangeReader;
use crate::error::Result;

/// Range reader over a remote archive served with HTTP range support.
///
/// Each fetch issues one `Range: bytes=..` request. Servers that ignore the
/// header and reply `200 OK` with the whole object still work; the requested
/// window is sliced out of the body.
#[derive(Debug, Clone)]
pub struct HttpReader {
    client: Client,
    url: String,
}

impl HttpReader {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Use a pre-configured client (timeouts, proxies, etc.).
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RangeReader for HttpReader {
    async fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let end = offset + length - 1;
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{end}"))
            .send()
            .await?
            .error_for_status()?;

        let status = response.status();
        let body = response.bytes().await?;

        if status == StatusCode::PARTIAL_CONTENT {
            let mut data = body.to_vec();
            data.truncate(length as usize);
            Ok(data)
        } else {
            // full-object reply; carve out the requested window
            let len = body.len() as u64;
            let start = offset.min(len) as usize;
            let end = offset.saturating_add(length).min(len) as usize;
            Ok(body[start..end].to_vec())
        }
    }
}
