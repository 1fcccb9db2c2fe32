//! [`CommentStore`] over the GitHub REST API (issue comments).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{io_err, CommentError};
use crate::writer::{marker_comment, CommentHandle, CommentStore};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: u32 = 100;
const MAX_PAGES: usize = 50;
const TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Pull request reference
// ---------------------------------------------------------------------------

/// The pull request comments are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// `repository` is `owner/name`, as in `GITHUB_REPOSITORY`.
    pub fn parse(repository: &str, number: u64) -> Result<Self, CommentError> {
        let (owner, repo) = repository
            .trim()
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| {
                CommentError::Context(format!(
                    "repository must look like owner/name, got '{repository}'"
                ))
            })?;
        Ok(PullRequestRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }

    /// Pull request number from a GitHub Actions event payload
    /// (`GITHUB_EVENT_PATH`).
    pub fn number_from_event(path: &Path) -> Result<u64, CommentError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let event: Value = serde_json::from_str(&contents).map_err(|source| CommentError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        event
            .pointer("/pull_request/number")
            .or_else(|| event.pointer("/issue/number"))
            .or_else(|| event.get("number"))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                CommentError::Context(format!(
                    "event payload {} carries no pull request number",
                    path.display()
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// GithubComments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

pub struct GithubComments {
    agent: ureq::Agent,
    api_url: String,
    token: String,
    pr: PullRequestRef,
}

impl GithubComments {
    pub fn new(api_url: &str, token: &str, pr: PullRequestRef) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(TIMEOUT)
            .user_agent(concat!("cdkdiff/", env!("CARGO_PKG_VERSION")))
            .build();
        GithubComments {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            pr,
        }
    }

    fn comments_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, self.pr.owner, self.pr.repo, self.pr.number
        )
    }

    fn comment_url(&self, id: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/comments/{id}",
            self.api_url, self.pr.owner, self.pr.repo
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    fn send(
        &self,
        method: &'static str,
        url: &str,
        body: Option<&str>,
    ) -> Result<ureq::Response, CommentError> {
        let request = self.request(method, url);
        let sent = match body {
            Some(body) => request.send_json(serde_json::json!({ "body": body })),
            None => request.call(),
        };
        sent.map_err(|e| match e {
            ureq::Error::Status(status, response) => CommentError::Http {
                method,
                url: url.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => CommentError::Transport {
                method,
                url: url.to_string(),
                message: t.to_string(),
            },
        })
    }

    fn handle_from(url: &str, response: ureq::Response) -> Result<CommentHandle, CommentError> {
        let comment: IssueComment = response.into_json().map_err(|source| CommentError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(CommentHandle { id: comment.id })
    }
}

impl CommentStore for GithubComments {
    fn find_existing(&self, key: &str) -> Result<Option<CommentHandle>, CommentError> {
        let needle = marker_comment(key);
        let mut next = Some(format!("{}?per_page={PER_PAGE}", self.comments_url()));
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            let response = self.send("GET", &url, None)?;
            let link = response.header("link").map(str::to_string);
            let comments: Vec<IssueComment> =
                response.into_json().map_err(|source| CommentError::Decode {
                    url: url.clone(),
                    source,
                })?;
            tracing::debug!(page = pages, count = comments.len(), "listed comments");

            if let Some(found) = comments
                .iter()
                .find(|c| c.body.as_deref().is_some_and(|b| b.contains(&needle)))
            {
                return Ok(Some(CommentHandle { id: found.id }));
            }

            if pages >= MAX_PAGES {
                tracing::warn!("stopped listing comments after {MAX_PAGES} pages");
                break;
            }
            next = link.as_deref().and_then(next_link);
        }
        Ok(None)
    }

    fn create(&self, body: &str) -> Result<CommentHandle, CommentError> {
        let url = self.comments_url();
        let response = self.send("POST", &url, Some(body))?;
        Self::handle_from(&url, response)
    }

    fn update(&self, handle: CommentHandle, body: &str) -> Result<CommentHandle, CommentError> {
        let url = self.comment_url(handle.id);
        let response = self.send("PATCH", &url, Some(body))?;
        Self::handle_from(&url, response)
    }
}

/// The `rel="next"` target of an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
