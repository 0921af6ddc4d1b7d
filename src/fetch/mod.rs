//! HTTP retrieval of trip archives.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};
use bytes::Bytes;
use tracing::debug;

/// Downloads `url` in full, failing on non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned {status}");
    }

    let body = resp.bytes().await?;
    debug!(url, bytes = body.len(), "Archive downloaded");
    Ok(body)
}
