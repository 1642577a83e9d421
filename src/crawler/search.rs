use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::crawler::task::{Article, Candidate, ProbeResult};
use crate::error::FetchError;

/// Terminal classification of a page search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// First article found in probe order
    Found { article: Article, probed: usize },

    /// Nothing found. Also covers a mix of misses and errors.
    NotFound { probed: usize },

    /// Every candidate failed; `cause` is the last failure seen
    Failed { probed: usize, cause: FetchError },

    /// Stopped by the cancellation token before the candidates ran out
    Cancelled { probed: usize },
}

impl SearchOutcome {
    /// Number of fetches that completed
    pub fn probed(&self) -> usize {
        match self {
            SearchOutcome::Found { probed, .. }
            | SearchOutcome::NotFound { probed }
            | SearchOutcome::Failed { probed, .. }
            | SearchOutcome::Cancelled { probed } => *probed,
        }
    }
}

/// Probe candidates in order until one is found.
///
/// `fetch` is never invoked after the first `Found`, nor once `cancel` has
/// fired. A fetch still in flight when the token fires is dropped.
pub async fn run_search<I, F, Fut>(
    candidates: I,
    cancel: &CancellationToken,
    mut fetch: F,
) -> SearchOutcome
where
    I: IntoIterator<Item = Candidate>,
    F: FnMut(Candidate) -> Fut,
    Fut: Future<Output = ProbeResult>,
{
    let mut probed = 0;
    let mut misses = 0;
    let mut last_error = None;

    for candidate in candidates {
        if cancel.is_cancelled() {
            return SearchOutcome::Cancelled { probed };
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SearchOutcome::Cancelled { probed },
            result = fetch(candidate) => result,
        };
        probed += 1;

        match result {
            ProbeResult::Found(article) => {
                debug!(id = article.id, probed, "Article found");
                return SearchOutcome::Found { article, probed };
            }
            ProbeResult::NotFound { id } => {
                debug!(id, "Candidate not found");
                misses += 1;
            }
            ProbeResult::Error { id, cause } => {
                debug!(id, error = %cause, "Candidate probe failed");
                last_error = Some(cause);
            }
        }
    }

    match last_error {
        Some(cause) if misses == 0 => SearchOutcome::Failed { probed, cause },
        _ => SearchOutcome::NotFound { probed },
    }
}
