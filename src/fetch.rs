use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use url::Url;

use crate::config::FetchConfig;
use crate::extract::ExtractionError;

/// Sites are less likely to block or degrade pages for a desktop browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Pooled HTTP client shared by all requests.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let mut builder = reqwest::ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers);

        if config.insecure_ssl {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            http: builder.build()?,
        })
    }

    /// GET `url` and return its body decoded as UTF-8.
    pub async fn fetch_html(&self, url: &Url) -> Result<String, ExtractionError> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Request(format!("TimeoutError: {}", e))
            } else if e.is_connect() {
                ExtractionError::Request(format!("ConnectError: {}", e))
            } else {
                ExtractionError::Request(format!("RequestError: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Upstream(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExtractionError::Request(format!("RequestError: {}", e)))?;

        std::str::from_utf8(&body)
            .map(str::to_owned)
            .map_err(|e| ExtractionError::Decode(e.to_string()))
    }
}
