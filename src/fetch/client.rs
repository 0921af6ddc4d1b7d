use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes archive download requests.
///
/// The acquisition layer only depends on this trait, so a proxying or
/// authenticating client can be swapped in without touching the pipeline.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
