use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{FetchError, ScrapeError};

/// Search parameters for a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Expected article ID for the page, the center of the search
    pub anchor_id: i64,

    /// Maximum distance from the anchor that will be probed
    pub radius: u32,

    /// Number of pages in the run this search belongs to
    pub page_count: u32,
}

impl SearchConfig {
    pub fn new(anchor_id: i64, radius: u32, page_count: u32) -> Result<Self, ScrapeError> {
        if page_count == 0 {
            return Err(ScrapeError::InvalidConfig("page count must be at least 1".into()));
        }

        Ok(Self {
            anchor_id,
            radius,
            page_count,
        })
    }

    /// Number of candidates a full search visits
    pub fn span(&self) -> u64 {
        2 * u64::from(self.radius) + 1
    }
}

/// An article ID to probe, with its distance from the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: i64,
    pub offset_from_anchor: i64,
}

/// One configured page of the paper, resolved from the URL the user supplied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    /// 1-based page number
    pub page: u32,

    /// Article URL the user pasted for this page
    pub url: Url,

    /// Article ID taken from the end of `url`
    pub anchor_id: i64,
}

impl PageTarget {
    pub fn parse(page: u32, raw: &str) -> Result<Self, ScrapeError> {
        let invalid = || ScrapeError::InvalidPageUrl {
            page,
            url: raw.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let anchor_id = extract_article_id(url.path()).ok_or_else(invalid)?;

        Ok(Self {
            page,
            url,
            anchor_id,
        })
    }

    /// Article URL for `id`, built by swapping the trailing ID of the page URL
    pub fn candidate_url(&self, id: i64) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop().push(&id.to_string());
        }
        url
    }
}

static ARTICLE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)$").expect("valid article ID pattern"));

/// Extract the trailing numeric article ID from a URL path
pub fn extract_article_id(path: &str) -> Option<i64> {
    ARTICLE_ID
        .captures(path)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Metadata scraped from an article page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub url: String,
    pub article_id: i64,
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub date_scraped: DateTime<Utc>,
}

/// A downloaded article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub page: u32,

    /// Image bytes
    pub content: Vec<u8>,

    /// File extension of the image, without the dot
    pub extension: String,

    pub metadata: ArticleMetadata,
}

impl Article {
    pub fn file_name(&self) -> String {
        format!("page{}_article_{}.{}", self.page, self.id, self.extension)
    }
}

/// Result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Found(Article),
    NotFound { id: i64 },
    Error { id: i64, cause: FetchError },
}

impl ProbeResult {
    pub fn id(&self) -> i64 {
        match self {
            ProbeResult::Found(article) => article.id,
            ProbeResult::NotFound { id } | ProbeResult::Error { id, .. } => *id,
        }
    }

    pub fn status(&self) -> ProbeStatus {
        match self {
            ProbeResult::Found(_) => ProbeStatus::Found,
            ProbeResult::NotFound { .. } => ProbeStatus::NotFound,
            ProbeResult::Error { cause, .. } => ProbeStatus::Error(cause.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "cause")]
pub enum ProbeStatus {
    Found,
    NotFound,
    Error(String),
}

/// Log entry for a completed probe. The article bytes live in the page report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRecord {
    pub page: u32,
    pub id: i64,

    #[serde(flatten)]
    pub status: ProbeStatus,

    pub completed_at: DateTime<Utc>,
}

impl ProbeRecord {
    pub fn from_result(page: u32, result: &ProbeResult) -> Self {
        Self {
            page,
            id: result.id(),
            status: result.status(),
            completed_at: Utc::now(),
        }
    }
}

/// Final classification of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum PageStatus {
    Found { article_id: i64 },
    NotFound,
    Error(String),
    Skipped(String),
    Cancelled,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Found { article_id } => write!(f, "found (article {})", article_id),
            PageStatus::NotFound => write!(f, "not found within radius"),
            PageStatus::Error(cause) => write!(f, "error: {}", cause),
            PageStatus::Skipped(reason) => write!(f, "skipped: {}", reason),
            PageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one page's search
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page: u32,
    pub anchor_id: Option<i64>,
    pub status: PageStatus,

    /// Candidates actually fetched
    pub probed: usize,

    pub article: Option<Article>,
}

/// Parameters shared by every page of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Edition date, used for archive naming
    pub date: NaiveDate,

    pub radius: u32,
    pub page_count: u32,

    /// One entry per page; `None` when no URL was given for that page
    pub page_urls: Vec<Option<String>>,
}

impl RunConfig {
    pub fn new(
        date: NaiveDate,
        radius: u32,
        page_count: u32,
        urls: Vec<String>,
    ) -> Result<Self, ScrapeError> {
        if page_count == 0 {
            return Err(ScrapeError::InvalidConfig("page count must be at least 1".into()));
        }
        if urls.len() > page_count as usize {
            return Err(ScrapeError::InvalidConfig(format!(
                "{} page URLs given for {} pages",
                urls.len(),
                page_count
            )));
        }

        let mut page_urls: Vec<Option<String>> = urls
            .into_iter()
            .map(|url| Some(url).filter(|u| !u.trim().is_empty()))
            .collect();
        page_urls.resize(page_count as usize, None);

        Ok(Self {
            date,
            radius,
            page_count,
            page_urls,
        })
    }

    /// Date as it appears in article URLs and archive names
    pub fn date_label(&self) -> String {
        self.date.format("%d-%m-%Y").to_string()
    }

    /// Upper bound on probes across the run
    pub fn total_probes(&self) -> u64 {
        u64::from(self.page_count) * (2 * u64::from(self.radius) + 1)
    }
}

/// One complete scraping attempt across all configured pages
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub id: Uuid,
    pub config: RunConfig,

    /// Page reports ordered by page number
    pub pages: Vec<PageReport>,

    /// Every probe across all pages, in the order the probes completed
    pub results: Vec<ProbeRecord>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

impl ScrapeRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            pages: Vec::new(),
            results: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
        }
    }

    pub fn record_page(&mut self, report: PageReport) {
        self.pages.push(report);
    }

    /// Seal the run with the probe log collected while it ran. Pages are
    /// put back in page order; probes keep their completion order.
    pub fn finish(&mut self, results: Vec<ProbeRecord>, cancelled: bool) {
        self.pages.sort_by_key(|report| report.page);
        self.results = results;
        self.cancelled = cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.pages.iter().filter_map(|report| report.article.as_ref())
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages
            .iter()
            .filter(|report| !matches!(report.status, PageStatus::Found { .. }))
    }

    /// True when every page resolved to an article and the run was not cancelled
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed_pages().next().is_none()
    }

    /// Found pages as a percentage of configured pages
    pub fn success_rate(&self) -> f64 {
        let found = self.articles().count() as f64;
        found / f64::from(self.config.page_count) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_extract_article_id() {
        assert_eq!(extract_article_id("/view_article/ahmedabad/15-03-2024/1/348123"), Some(348123));
        assert_eq!(extract_article_id("/article/348123/"), None);
        assert_eq!(extract_article_id("/article/abc"), None);
        assert_eq!(extract_article_id(""), None);
    }

    #[test]
    fn test_article_id_pattern_shared_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|i| std::thread::spawn(move || extract_article_id(&format!("/view/{}/{}", i, 1000 + i))))
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(ids, (0..8).map(|i| Some(1000 + i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_page_target_parse() {
        let target = PageTarget::parse(2, "https://epaper.example.com/view_article/city/15-03-2024/2/348100").unwrap();
        assert_eq!(target.page, 2);
        assert_eq!(target.anchor_id, 348100);

        assert!(matches!(
            PageTarget::parse(1, "not a url"),
            Err(ScrapeError::InvalidPageUrl { page: 1, .. })
        ));
        assert!(PageTarget::parse(1, "https://epaper.example.com/view_article/").is_err());
        assert!(PageTarget::parse(1, "ftp://epaper.example.com/1/2").is_err());
    }

    #[test]
    fn test_candidate_url_swaps_trailing_id() {
        let target = PageTarget::parse(1, "https://epaper.example.com/view_article/city/15-03-2024/1/100?lang=gu").unwrap();
        assert_eq!(
            target.candidate_url(102).as_str(),
            "https://epaper.example.com/view_article/city/15-03-2024/1/102?lang=gu"
        );
    }

    #[test]
    fn test_run_config_pads_missing_urls() {
        let config = RunConfig::new(date(), 3, 3, vec!["https://a/1".into(), "  ".into()]).unwrap();
        assert_eq!(config.page_urls, vec![Some("https://a/1".to_string()), None, None]);
        assert_eq!(config.total_probes(), 21);
        assert_eq!(config.date_label(), "15-03-2024");
    }

    #[test]
    fn test_run_config_rejects_bad_counts() {
        assert!(RunConfig::new(date(), 1, 0, vec![]).is_err());
        assert!(RunConfig::new(date(), 1, 1, vec!["a".into(), "b".into()]).is_err());
        assert!(SearchConfig::new(1, 0, 0).is_err());
        assert_eq!(SearchConfig::new(1, 2, 1).unwrap().span(), 5);
    }

    #[test]
    fn test_run_success_requires_every_page() {
        let config = RunConfig::new(date(), 0, 2, vec![]).unwrap();
        let mut run = ScrapeRun::new(config);
        run.record_page(PageReport {
            page: 2,
            anchor_id: Some(7),
            status: PageStatus::NotFound,
            probed: 1,
            article: None,
        });
        run.record_page(PageReport {
            page: 1,
            anchor_id: None,
            status: PageStatus::Skipped("no URL provided".into()),
            probed: 0,
            article: None,
        });
        run.finish(vec![ProbeRecord::from_result(2, &ProbeResult::NotFound { id: 7 })], false);

        assert!(run.is_finished());
        assert_eq!(run.pages[0].page, 1);
        assert_eq!(run.failed_pages().count(), 2);
        assert!(!run.is_success());
        assert_eq!(run.success_rate(), 0.0);
        assert_eq!(run.results.len(), 1);
    }

    #[test]
    fn test_page_status_display() {
        assert_eq!(PageStatus::NotFound.to_string(), "not found within radius");
        assert_eq!(PageStatus::Error("HTTP 500".into()).to_string(), "error: HTTP 500");
        assert_eq!(PageStatus::Found { article_id: 5 }.to_string(), "found (article 5)");
    }
}
