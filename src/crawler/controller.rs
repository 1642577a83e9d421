use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::config::ScraperSettings;
use crate::crawler::scheduler::generate_probe_order;
use crate::crawler::search::{run_search, SearchOutcome};
use crate::crawler::task::{
    PageReport, PageStatus, PageTarget, ProbeRecord, RunConfig, ScrapeRun, SearchConfig,
};
use crate::fetch::PageFetcher;
use crate::utils::progress::{ProgressReporter, ProgressTracker};

/// Drives one scrape run: a bounded number of pages are searched at once,
/// each page probing its candidates one after another.
pub struct ScrapeController {
    config: RunConfig,
    fetcher: Arc<dyn PageFetcher>,
    progress: Arc<ProgressTracker>,
    concurrency: usize,
    politeness_delay: Duration,
}

impl ScrapeController {
    pub fn new(
        config: RunConfig,
        settings: &ScraperSettings,
        fetcher: Arc<dyn PageFetcher>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let progress = Arc::new(ProgressTracker::new(config.total_probes(), reporter));

        Self {
            config,
            fetcher,
            progress,
            concurrency: settings.effective_concurrency(),
            politeness_delay: settings.politeness_delay(),
        }
    }

    /// Run every page to completion, or until `cancel` fires.
    ///
    /// The returned run is finished either way; pages that never got to
    /// probe are reported as cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> ScrapeRun {
        let mut run = ScrapeRun::new(self.config.clone());
        info!(
            run_id = %run.id,
            pages = self.config.page_count,
            radius = self.config.radius,
            date = %self.config.date_label(),
            "Starting scrape run"
        );

        // Shared by all pages so records land in completion order
        let log = Mutex::new(Vec::new());

        {
            let pages = self.config.page_urls.iter().enumerate().map(|(index, url)| {
                // page_count is a u32, so the index fits
                let page = index as u32 + 1;
                self.search_page(page, url.as_deref(), &log, cancel)
            });

            let mut completed = stream::iter(pages).buffer_unordered(self.concurrency);
            while let Some(report) = completed.next().await {
                info!(page = report.page, probed = report.probed, "Page {}: {}", report.page, report.status);
                run.record_page(report);
            }
        }

        run.finish(log.into_inner(), cancel.is_cancelled());
        info!(
            run_id = %run.id,
            found = run.articles().count(),
            cancelled = run.cancelled,
            "Scrape run finished"
        );
        run
    }

    async fn search_page(
        &self,
        page: u32,
        url: Option<&str>,
        log: &Mutex<Vec<ProbeRecord>>,
        cancel: &CancellationToken,
    ) -> PageReport {
        let span = 2 * u64::from(self.config.radius) + 1;

        let Some(url) = url else {
            warn!(page, "No URL provided for page");
            self.progress.advance(span);
            return skipped(page, None, PageStatus::Skipped("no URL provided".into()));
        };

        let target = match PageTarget::parse(page, url) {
            Ok(target) => target,
            Err(e) => {
                warn!(page, error = %e, "Invalid URL format");
                self.progress.advance(span);
                return skipped(page, None, PageStatus::Error(e.to_string()));
            }
        };

        let search = match SearchConfig::new(target.anchor_id, self.config.radius, self.config.page_count) {
            Ok(search) => search,
            Err(e) => {
                self.progress.advance(span);
                return skipped(page, Some(target.anchor_id), PageStatus::Error(e.to_string()));
            }
        };

        let target_ref = &target;

        // Article IDs are never negative
        let candidates = generate_probe_order(search.anchor_id, search.radius).filter(|c| c.id >= 0);

        let outcome = run_search(candidates, cancel, move |candidate| async move {
            if candidate.offset_from_anchor != 0 && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }

            let result = self.fetcher.fetch(target_ref, candidate.id).await;
            log.lock().await.push(ProbeRecord::from_result(page, &result));
            self.progress.advance(1);
            result
        })
        .await;

        let probed = outcome.probed();
        if !matches!(outcome, SearchOutcome::Cancelled { .. }) {
            // Candidates skipped by an early stop still count towards the total
            self.progress.advance(search.span().saturating_sub(probed as u64));
        }

        let (status, article) = match outcome {
            SearchOutcome::Found { article, .. } => (PageStatus::Found { article_id: article.id }, Some(article)),
            SearchOutcome::NotFound { .. } => (PageStatus::NotFound, None),
            SearchOutcome::Failed { cause, .. } => (PageStatus::Error(cause.to_string()), None),
            SearchOutcome::Cancelled { .. } => (PageStatus::Cancelled, None),
        };

        PageReport {
            page,
            anchor_id: Some(target.anchor_id),
            status,
            probed,
            article,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }
}

fn skipped(page: u32, anchor_id: Option<i64>, status: PageStatus) -> PageReport {
    PageReport {
        page,
        anchor_id,
        status,
        probed: 0,
        article: None,
    }
}
