// Minimal GitHub contents API client used to sync campaign and budget JSON.
//
// Reads and writes `repos/{owner}/{repo}/contents/{path}`. Writes fetch the
// current blob `sha` first. Rate limiting (429) is retried with backoff;
// a network failure is retried once.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{PlannerError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const MAX_RATE_LIMIT_RETRIES: u32 = 2;
pub const MAX_NETWORK_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

const COMMITTER_NAME: &str = "Campaign Planner Bot";
const COMMITTER_EMAIL: &str = "campaign-planner-bot@users.noreply.github.com";

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: SecretString,
}

/// A file as stored in the repository.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    committer: Committer<'a>,
    author: Committer<'a>,
}

/// How long to wait before retrying a rate-limited request, or `None` once
/// the retry budget is spent. `Retry-After` wins when present; otherwise the
/// default delay doubles per attempt.
pub fn rate_limit_delay(attempt: u32, retry_after: Option<&str>) -> Option<Duration> {
    if attempt >= MAX_RATE_LIMIT_RETRIES {
        return None;
    }
    let header = retry_after.and_then(|v| v.trim().parse::<u64>().ok());
    Some(match header {
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_RETRY_DELAY * 2u32.pow(attempt),
    })
}

/// Retry bookkeeping for one logical request.
#[derive(Debug, Default)]
struct RetryState {
    rate_limited: u32,
    network_failures: u32,
}

impl RetryState {
    fn after_rate_limit(&mut self, retry_after: Option<&str>) -> Option<Duration> {
        let delay = rate_limit_delay(self.rate_limited, retry_after)?;
        self.rate_limited += 1;
        Some(delay)
    }

    fn after_network_error(&mut self) -> Option<Duration> {
        if self.network_failures >= MAX_NETWORK_RETRIES {
            return None;
        }
        self.network_failures += 1;
        Some(DEFAULT_RETRY_DELAY)
    }
}

/// Decode a contents API payload. GitHub wraps base64 at 60 columns.
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = B64
        .decode(compact)
        .map_err(|e| PlannerError::Validation(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| PlannerError::Validation(format!("content is not UTF-8: {}", e)))
}

pub fn encode_content(text: &str) -> String {
    B64.encode(text.as_bytes())
}

pub struct GitHubClient {
    config: GitHubConfig,
    http: Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(GitHubClient { config, http })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bearer {}", self.config.token.expose_secret()))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "campaign-planner")
    }

    /// Send with the retry policy. `build` is called once per attempt.
    fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = RetryState::default();
        loop {
            match self.authorized(build()).send() {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    match retries.after_rate_limit(retry_after.as_deref()) {
                        Some(delay) => {
                            warn!(attempt = retries.rate_limited, delay_secs = delay.as_secs(), "GitHub rate limited, retrying");
                            thread::sleep(delay);
                        }
                        None => return Ok(resp),
                    }
                }
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_status() => match retries.after_network_error() {
                    Some(delay) => {
                        warn!(error = %e, "GitHub request failed, retrying once");
                        thread::sleep(delay);
                    }
                    None => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn failure(resp: Response) -> PlannerError {
        let status = resp.status().as_u16();
        let message = resp.text().unwrap_or_default();
        PlannerError::Transport { status, message }
    }

    /// Fetch a file. A 404 is `Ok(None)`: the file will be created on the
    /// first save.
    pub fn fetch(&self, path: &str) -> Result<Option<RemoteFile>> {
        let url = self.contents_url(path);
        let branch = self.config.branch.clone();
        let resp = self.send(|| self.http.get(&url).query(&[("ref", branch.as_str())]))?;
        if resp.status() == StatusCode::NOT_FOUND {
            info!(path, "file not found on GitHub, will be created on first save");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp));
        }
        let body: ContentsResponse = resp.json()?;
        Ok(Some(RemoteFile {
            content: decode_content(&body.content)?,
            sha: body.sha,
        }))
    }

    /// Create or update a file with `content`.
    pub fn put(&self, path: &str, content: &str, message: &str) -> Result<()> {
        let existing = self.fetch(path)?;
        let body = PutRequest {
            message,
            content: encode_content(content),
            branch: &self.config.branch,
            sha: existing.as_ref().map(|f| f.sha.as_str()),
            committer: Committer { name: COMMITTER_NAME, email: COMMITTER_EMAIL },
            author: Committer { name: COMMITTER_NAME, email: COMMITTER_EMAIL },
        };
        let url = self.contents_url(path);
        let resp = self.send(|| self.http.put(&url).json(&body))?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp));
        }
        info!(path, created = existing.is_none(), "saved file to GitHub");
        Ok(())
    }
}
