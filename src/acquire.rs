//! Acquisition adapter: turns a source location into a raw trip table.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::parse_table;
use crate::table::Table;

/// Yields one raw table per source location.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(&self, source: &str) -> Result<Table>;
}

/// Reads `http(s)://` sources through an [`HttpClient`] and everything else
/// from the local filesystem, then unpacks the payload with [`parse_table`].
pub struct ArchiveAcquirer<C> {
    client: C,
}

impl<C: HttpClient> ArchiveAcquirer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> Acquirer for ArchiveAcquirer<C> {
    #[tracing::instrument(skip_all, fields(source = %source))]
    async fn acquire(&self, source: &str) -> Result<Table> {
        let bytes = if source.starts_with("http://") || source.starts_with("https://") {
            fetch_bytes(&self.client, source)
                .await
                .map_err(|e| PipelineError::acquisition(source, e))?
                .to_vec()
        } else {
            std::fs::read(source).map_err(|e| PipelineError::acquisition(source, e))?
        };
        debug!(bytes = bytes.len(), "Source bytes received, parsing");

        let table = parse_table(&bytes).map_err(|e| PipelineError::acquisition(source, e))?;
        if table.is_empty() {
            warn!("Source yielded no records");
        }
        Ok(table)
    }
}

/// File name portion of a source location, used in logs and stats.
pub fn source_name(source: &str) -> String {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    path.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(source)
        .to_string()
}
