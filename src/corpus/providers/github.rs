// src/corpus/providers/github.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::CorpusRepo;
use crate::corpus::{CorpusSource, ImageFetcher, ListedFile};
use crate::error::FetchError;

pub const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("spawn-reconciler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

/// Lists a repository directory through the GitHub contents API.
#[derive(Clone)]
pub struct GitHubCorpusSource {
    base_url: String,
    repo: CorpusRepo,
    token: Option<String>,
    client: Client,
}

impl GitHubCorpusSource {
    pub fn new(repo: CorpusRepo) -> Self {
        Self {
            base_url: GITHUB_API.to_string(),
            repo,
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn contents_url(&self) -> String {
        let path = self.repo.path.trim_matches('/');
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, self.repo.owner, self.repo.repo, path
        )
    }
}

#[async_trait]
impl CorpusSource for GitHubCorpusSource {
    async fn list_files(&self) -> Result<Vec<ListedFile>> {
        let url = self.contents_url();
        let mut req = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .timeout(Duration::from_secs(30));
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let rsp = req
            .send()
            .await
            .with_context(|| format!("github contents get() {url}"))?
            .error_for_status()
            .map_err(|e| anyhow!("github contents non-2xx: {e}"))?;
        let items: Vec<ContentItem> = rsp.json().await.context("decoding github contents")?;

        Ok(items
            .into_iter()
            .filter(|it| it.kind == "file")
            .map(|it| ListedFile {
                name: it.name,
                download_url: it.download_url,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "github"
    }
}

/// Plain HTTP GET image downloader.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl HttpImageFetcher {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_err = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let rsp = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_err)?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = rsp.bytes().await.map_err(request_err)?;
        Ok(bytes.to_vec())
    }
}
