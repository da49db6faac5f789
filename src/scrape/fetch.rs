//! Result-page retrieval.
//!
//! Proxies attach at the client level in reqwest, so a fresh client is
//! built per attempt for whatever egress the rotator handed out. Requests
//! carry browser-like headers (result sites serve bot-looking traffic a
//! captcha page) plus any per-source overrides from config.

use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT,
};
use tracing::{debug, instrument};

use crate::config::ScrapeSourceConfig;
use crate::errors::FetchError;
use crate::models::RawDocument;
use crate::proxy::Egress;

static BROWSER_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.6,en;q=0.5"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
});

/// Retrieval seam for the scrape orchestrator. Production uses
/// [`PageFetcher`]; tests script responses without a network.
pub trait Fetch {
    async fn fetch(
        &self,
        source: &ScrapeSourceConfig,
        egress: &Egress,
    ) -> Result<RawDocument, FetchError>;
}

/// HTTP fetcher backed by reqwest.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn client_for(&self, egress: &Egress) -> Result<reqwest::Client, FetchError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Egress::Proxy(identity) = egress {
            let mut proxy = reqwest::Proxy::all(identity.url())
                .map_err(|e| FetchError::Unknown(e.to_string()))?;
            if let (Some(user), Some(pass)) = (&identity.username, &identity.password) {
                proxy = proxy.basic_auth(user, pass);
            }
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| FetchError::Unknown(e.to_string()))
    }

    fn request_headers(source: &ScrapeSourceConfig) -> Result<HeaderMap, FetchError> {
        let mut headers = BROWSER_HEADERS.clone();
        for (name, value) in &source.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Unknown(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| FetchError::Unknown(e.to_string()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl Fetch for PageFetcher {
    #[instrument(level = "debug", skip_all, fields(lottery = %source.lottery_id.id_str(), egress = %egress.label()))]
    async fn fetch(
        &self,
        source: &ScrapeSourceConfig,
        egress: &Egress,
    ) -> Result<RawDocument, FetchError> {
        let client = self.client_for(egress)?;
        let headers = Self::request_headers(source)?;

        let response = client
            .get(&source.url)
            .headers(headers)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status().as_u16();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let body = response.text().await.map_err(classify_request_error)?;
        debug!(bytes = body.len(), status, "page fetched");

        Ok(RawDocument {
            url: source.url.clone(),
            body,
            fetched_at: Utc::now(),
        })
    }
}

fn classify_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unknown(err.to_string())
    }
}

/// Map a response status onto the failure taxonomy. `None` means the
/// response is usable.
pub fn classify_status(status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        403 | 429 => Some(FetchError::Blocked(status)),
        other => Some(FetchError::Http(other)),
    }
}
