use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::cli::config::{RetrySettings, ScraperSettings, Selectors};
use crate::crawler::task::{Article, ArticleMetadata, PageTarget, ProbeResult};
use crate::error::FetchError;
use crate::fetch::retry::with_retry;
use crate::fetch::PageFetcher;

const DEFAULT_EXTENSION: &str = "jpeg";

/// Fetches article pages over HTTP and downloads the article image
pub struct HttpFetcher {
    client: Client,
    selectors: ArticleSelectors,
    retry: RetrySettings,
}

struct ArticleSelectors {
    image: Selector,
    title: Selector,
    text: Selector,
}

/// What an article page yields before the image is downloaded
#[derive(Debug, PartialEq, Eq)]
struct ArticlePage {
    image_src: String,
    title: String,
    text: Option<String>,
}

impl ArticleSelectors {
    fn parse(selectors: &Selectors) -> Result<Self> {
        Ok(Self {
            image: create_selector(&selectors.image)?,
            title: create_selector(&selectors.title)?,
            text: create_selector(&selectors.text)?,
        })
    }
}

fn create_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid CSS selector '{}': {:?}", css, e))
}

impl HttpFetcher {
    pub fn new(settings: &ScraperSettings, retry: RetrySettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.request_timeout())
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        let selectors = ArticleSelectors::parse(&settings.selectors)?;

        Ok(Self {
            client,
            selectors,
            retry,
        })
    }

    /// GET `url`. `Ok(None)` means the server reported the resource absent.
    async fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        let client = &self.client;
        with_retry(&self.retry, move || async move {
            let response = client.get(url.clone()).send().await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND || status == StatusCode::GONE || status == StatusCode::NO_CONTENT {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let body = response.bytes().await?;
            Ok(Some(body.to_vec()))
        })
        .await
    }

    async fn try_fetch(&self, page: &PageTarget, id: i64) -> Result<Option<Article>, FetchError> {
        let article_url = page.candidate_url(id);

        let Some(body) = self.get(&article_url).await? else {
            return Ok(None);
        };

        let html = String::from_utf8_lossy(&body);
        let Some(found) = self.parse_article(&html) else {
            debug!(url = %article_url, "No article image on page");
            return Ok(None);
        };

        let image_url = article_url
            .join(&found.image_src)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", found.image_src, e)))?;

        // The page exists, so a missing image is a failure rather than a miss
        let content = self
            .get(&image_url)
            .await?
            .ok_or(FetchError::Status(StatusCode::NOT_FOUND.as_u16()))?;

        debug!(url = %image_url, bytes = content.len(), "Downloaded article image");

        Ok(Some(Article {
            id,
            page: page.page,
            content,
            extension: image_extension(&image_url),
            metadata: ArticleMetadata {
                url: article_url.to_string(),
                article_id: id,
                title: found.title,
                content: found.text,
                date_scraped: Utc::now(),
            },
        }))
    }

    fn parse_article(&self, html: &str) -> Option<ArticlePage> {
        let doc = Html::parse_document(html);

        let image_src = doc
            .select(&self.selectors.image)
            .find_map(|el| el.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())?
            .to_string();

        let title = doc
            .select(&self.selectors.title)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let text = doc
            .select(&self.selectors.text)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty());

        Some(ArticlePage {
            image_src,
            title,
            text,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, page: &PageTarget, id: i64) -> ProbeResult {
        match self.try_fetch(page, id).await {
            Ok(Some(article)) => ProbeResult::Found(article),
            Ok(None) => ProbeResult::NotFound { id },
            Err(cause) => ProbeResult::Error { id, cause },
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn image_extension(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARTICLE_HTML: &str = r#"
        <html><body>
          <div class="article_title"> Rain in the city </div>
          <img id="current_artical" src="/images/348101.PNG">
          <div class="article_text"><p>Heavy rain</p> <p>expected today.</p></div>
        </body></html>
    "#;

    fn fetcher() -> HttpFetcher {
        let mut settings = ScraperSettings::default();
        settings.request_timeout_secs = 5;
        let retry = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        HttpFetcher::new(&settings, retry).unwrap()
    }

    fn target(server: &MockServer) -> PageTarget {
        PageTarget::parse(3, &format!("{}/view_article/city/15-03-2024/3/348100", server.uri())).unwrap()
    }

    #[test]
    fn test_parse_article_page() {
        let page = fetcher().parse_article(ARTICLE_HTML).unwrap();
        assert_eq!(
            page,
            ArticlePage {
                image_src: "/images/348101.PNG".to_string(),
                title: "Rain in the city".to_string(),
                text: Some("Heavy rain expected today.".to_string()),
            }
        );
    }

    #[test]
    fn test_page_without_image() {
        let html = r#"<html><body><div class="article_title">Empty</div></body></html>"#;
        assert!(fetcher().parse_article(html).is_none());
        assert!(fetcher().parse_article(r#"<img id="current_artical" src="  ">"#).is_none());
    }

    #[test]
    fn test_image_extension() {
        let ext = |u: &str| image_extension(&Url::parse(u).unwrap());
        assert_eq!(ext("https://cdn.example.com/a/b.PNG"), "png");
        assert_eq!(ext("https://cdn.example.com/a/b"), "jpeg");
        assert_eq!(ext("https://cdn.example.com/a/b.weird-ext"), "jpeg");
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut settings = ScraperSettings::default();
        settings.selectors.image = "img[[".to_string();
        assert!(HttpFetcher::new(&settings, RetrySettings::default()).is_err());
    }

    #[tokio::test]
    async fn test_found_article_downloads_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/view_article/city/15-03-2024/3/348101"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/348101.PNG"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&target(&server), 348101).await;

        let article = match result {
            ProbeResult::Found(article) => article,
            other => panic!("expected Found, got {:?}", other),
        };
        assert_eq!(article.id, 348101);
        assert_eq!(article.page, 3);
        assert_eq!(article.content, b"png-bytes");
        assert_eq!(article.file_name(), "page3_article_348101.png");
        assert_eq!(article.metadata.title, "Rain in the city");
        assert!(article.metadata.url.ends_with("/3/348101"));
    }

    #[tokio::test]
    async fn test_missing_article_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&target(&server), 348102).await;
        assert_eq!(result, ProbeResult::NotFound { id: 348102 });
    }

    #[tokio::test]
    async fn test_page_without_image_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>No article</body></html>"))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&target(&server), 348103).await;
        assert_eq!(result, ProbeResult::NotFound { id: 348103 });
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&target(&server), 348104).await;
        assert_eq!(
            result,
            ProbeResult::Error {
                id: 348104,
                cause: FetchError::Status(500)
            }
        );
    }

    #[tokio::test]
    async fn test_missing_image_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/view_article/city/15-03-2024/3/348101"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/348101.PNG"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&target(&server), 348101).await;
        assert_eq!(
            result,
            ProbeResult::Error {
                id: 348101,
                cause: FetchError::Status(404)
            }
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let retry = RetrySettings {
            max_attempts: 1,
            initial_delay_ms: 1,
            jitter: false,
            ..RetrySettings::default()
        };
        let fetcher = HttpFetcher::new(&ScraperSettings::default(), retry).unwrap();

        let result = fetcher.fetch(&target(&server), 348105).await;
        assert_eq!(result, ProbeResult::NotFound { id: 348105 });
    }
}
