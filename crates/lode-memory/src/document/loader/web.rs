use std::time::Duration;

use url::Url;

use super::super::{Document, DocumentError, DocumentMetadata};

/// Default maximum response body size: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Fetches a single web page and reduces it to its visible text.
#[derive(Debug, Clone)]
pub struct WebLoader {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl Default for WebLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl WebLoader {
    #[must_use]
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            client: lode_llm::http::client_with_timeout(Duration::from_secs(30)),
            max_body_bytes,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Issue one GET request and turn the HTML response into a [`Document`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidUrl`] for anything but an absolute http(s) URL,
    /// [`DocumentError::HttpStatus`] for non-success responses and
    /// [`DocumentError::FileTooLarge`] when the body exceeds the configured limit.
    pub async fn fetch(&self, url: &str) -> Result<Document, DocumentError> {
        let parsed = validate_url(url)?;

        let resp = self.client.get(parsed.as_str()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DocumentError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.len() > self.max_body_bytes {
            return Err(DocumentError::FileTooLarge(bytes.len() as u64));
        }

        let html = String::from_utf8_lossy(&bytes).into_owned();
        let (title, content) = tokio::task::spawn_blocking(move || extract_page(&html))
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

        tracing::debug!(url, chars = content.chars().count(), "fetched web page");

        let mut metadata = DocumentMetadata::new(url, "text/html");
        metadata.title = title;
        Ok(Document { content, metadata })
    }
}

fn validate_url(raw: &str) -> Result<Url, DocumentError> {
    let parsed = Url::parse(raw).map_err(|_| DocumentError::InvalidUrl(raw.to_owned()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(DocumentError::InvalidUrl(raw.to_owned())),
    }
}

fn first_text(soup: &scrape_core::Soup, selector: &str) -> Result<Option<String>, DocumentError> {
    let tags = soup
        .find_all(selector)
        .map_err(|e| DocumentError::Html(format!("invalid selector {selector}: {e}")))?;
    Ok(tags.into_iter().next().map(|tag| tag.text()))
}

/// Page title and body text with whitespace collapsed inside each line.
fn extract_page(html: &str) -> Result<(Option<String>, String), DocumentError> {
    let soup = scrape_core::Soup::parse(html);

    let title = first_text(&soup, "title")?
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty());

    let text = match first_text(&soup, "body")? {
        Some(body) => body,
        None => first_text(&soup, "html")?.unwrap_or_default(),
    };

    Ok((title, collapse_whitespace(&text)))
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
