pub mod http;
pub mod retry;

use async_trait::async_trait;

use crate::crawler::task::{PageTarget, ProbeResult};

pub use http::HttpFetcher;

/// Resolves one candidate article of a page.
///
/// Every failure is folded into `ProbeResult::Error`; implementations never
/// return early with a fault of their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, page: &PageTarget, id: i64) -> ProbeResult;
}
