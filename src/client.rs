use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use url::Url;

use crate::config::PortalSettings;

/// Where pages come from. The portal in production, fixtures in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_text(&self, url: &Url) -> Result<String>;

    /// Form-encoded POST; `referer` is the page that served the form.
    async fn post_form(&self, url: &Url, form: &[(String, String)], referer: &Url) -> Result<String>;

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Shared portal session. The cookie store carries the postback session across hops.
pub struct PortalClient {
    http: reqwest::Client,
}

impl PortalClient {
    pub fn new(portal: &PortalSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let http = reqwest::Client::builder()
            .user_agent(portal.user_agent.as_str())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(portal.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http })
    }

    pub fn shared(portal: &PortalSettings) -> Result<Arc<dyn PageSource>> {
        Ok(Arc::new(Self::new(portal)?))
    }
}

#[async_trait]
impl PageSource for PortalClient {
    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }
        response.text().await.context("Failed to read response body")
    }

    async fn post_form(&self, url: &Url, form: &[(String, String)], referer: &Url) -> Result<String> {
        let response = self
            .http
            .post(url.clone())
            .header(REFERER, referer.as_str())
            .form(form)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }
        response.text().await.context("Failed to read response body")
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }
        let bytes = response.bytes().await.context("Failed to read response body")?;
        Ok(bytes.to_vec())
    }
}
