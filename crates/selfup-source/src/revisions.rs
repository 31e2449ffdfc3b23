use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, LINK, USER_AGENT};
use selfup_core::UpdateConfig;

/// Counts the revisions published upstream.
pub trait RevisionCounter {
    fn total_revisions(&self) -> Result<u64>;
}

/// Reads the commit total from a paginated GitHub commit listing. With one
/// commit per page the `rel="last"` page number equals the commit count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRevisionCounter {
    commits_api_url: String,
}

impl GitHubRevisionCounter {
    pub fn new(commits_api_url: impl Into<String>) -> Self {
        Self {
            commits_api_url: commits_api_url.into(),
        }
    }

    pub fn from_config(config: &UpdateConfig) -> Self {
        Self::new(config.commits_api_url.clone())
    }

    fn request_url(&self) -> String {
        let separator = if self.commits_api_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}per_page=1", self.commits_api_url, separator)
    }
}

impl RevisionCounter for GitHubRevisionCounter {
    fn total_revisions(&self) -> Result<u64> {
        let url = self.request_url();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed building HTTP client")?;
        let response = client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("selfup/", env!("CARGO_PKG_VERSION")))
            .send()
            .with_context(|| format!("failed requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("revision listing {url} returned an error status"))?;

        let total = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(parse_last_page)
            .unwrap_or(0);
        tracing::debug!(url = %url, total, "counted upstream revisions");
        Ok(total)
    }
}

/// Extracts the `page` query value of the `rel="last"` entry of a `Link`
/// header. Anything unparseable yields 0.
pub fn parse_last_page(link_header: &str) -> u64 {
    link_header
        .split(',')
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_last = parts.any(|param| {
                let param = param.trim();
                param == "rel=\"last\"" || param == "rel=last"
            });
            if !is_last {
                return None;
            }
            let url = target.strip_prefix('<')?.strip_suffix('>')?;
            let (_, query) = url.split_once('?')?;
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                if key == "page" {
                    value.parse::<u64>().ok()
                } else {
                    None
                }
            })
        })
        .unwrap_or(0)
}
