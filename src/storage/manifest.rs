use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::crawler::task::{ArticleMetadata, PageStatus, ProbeRecord, ScrapeRun};
use crate::error::ArchiveError;

pub const METADATA_FILE: &str = "article_metadata.json";
pub const LOG_FILE: &str = "scraping_log.json";

/// Contents of `scraping_log.json`
#[derive(Debug, Serialize)]
pub struct ScrapingLog<'a> {
    pub run_id: Uuid,
    pub date: String,
    pub radius: u32,
    pub successful_urls: Vec<&'a str>,
    pub stats: LogStats,
    pub pages: Vec<PageSummary<'a>>,
    pub probes: &'a [ProbeRecord],
}

#[derive(Debug, Serialize)]
pub struct LogStats {
    pub total_downloaded: usize,
    pub pages_processed: u32,
    pub success_rate: f64,
    pub last_successful_date: Option<DateTime<Utc>>,
    pub article_ids_by_page: BTreeMap<u32, Vec<i64>>,
    pub last_successful_ids: BTreeMap<u32, i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct PageSummary<'a> {
    pub page: u32,
    pub anchor_id: Option<i64>,
    pub status: &'a PageStatus,
    pub probed: usize,
}

impl<'a> ScrapingLog<'a> {
    pub fn from_run(run: &'a ScrapeRun) -> Self {
        let mut article_ids_by_page: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        let mut last_successful_ids = BTreeMap::new();
        let mut last_successful_date = None;

        for article in run.articles() {
            article_ids_by_page.entry(article.page).or_default().push(article.id);
            last_successful_ids.insert(article.page, article.id);
            last_successful_date = last_successful_date.max(Some(article.metadata.date_scraped));
        }

        Self {
            run_id: run.id,
            date: run.config.date_label(),
            radius: run.config.radius,
            successful_urls: run.articles().map(|a| a.metadata.url.as_str()).collect(),
            stats: LogStats {
                total_downloaded: run.articles().count(),
                pages_processed: run.config.page_count,
                success_rate: run.success_rate(),
                last_successful_date,
                article_ids_by_page,
                last_successful_ids,
                started_at: run.started_at,
                finished_at: run.finished_at,
                cancelled: run.cancelled,
            },
            pages: run
                .pages
                .iter()
                .map(|report| PageSummary {
                    page: report.page,
                    anchor_id: report.anchor_id,
                    status: &report.status,
                    probed: report.probed,
                })
                .collect(),
            probes: &run.results,
        }
    }
}

/// Name of the archive for a run, e.g. `epaper_15-03-2024.zip`
pub fn archive_file_name(prefix: &str, run: &ScrapeRun) -> String {
    format!("{}_{}.zip", prefix, run.config.date_label())
}

/// Archive entries for a run: article images in page order, then the
/// metadata and log documents. Pages that did not resolve contribute nothing.
pub fn bundle_entries(run: &ScrapeRun) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let date = run.config.date_label();
    let mut entries = Vec::new();
    let mut metadata: BTreeMap<String, &ArticleMetadata> = BTreeMap::new();

    for article in run.articles() {
        entries.push((format!("images/{}/{}", date, article.file_name()), article.content.clone()));
        metadata.insert(article.id.to_string(), &article.metadata);
    }

    entries.push((METADATA_FILE.to_string(), serde_json::to_vec_pretty(&metadata)?));
    entries.push((LOG_FILE.to_string(), serde_json::to_vec_pretty(&ScrapingLog::from_run(run))?));

    Ok(entries)
}
