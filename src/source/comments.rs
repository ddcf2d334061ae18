//! Best-effort fetch of existing review discussion for a patch.
//!
//! Every request here is advisory context for the analysis prompt; any
//! failure is logged as a warning and yields an empty result rather than
//! interrupting the pipeline.

use serde::Deserialize;
use tracing::{debug, warn};

use super::PatchSource;

#[derive(Debug, Deserialize)]
struct User {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewComment {
    user: Option<User>,
    body: Option<String>,
    path: Option<String>,
    line: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    user: Option<User>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Review {
    user: Option<User>,
    state: Option<String>,
    body: Option<String>,
}

fn login(user: &Option<User>) -> &str {
    user.as_ref()
        .and_then(|u| u.login.as_deref())
        .unwrap_or("Unknown")
}

/// Fetch existing comments and reviews for the patch, formatted as a single
/// block ready to embed in the analysis prompt. Returns `None` when there is
/// nothing to show (no comments, unsupported source, or fetch failure).
pub async fn fetch(
    client: &reqwest::Client,
    token: Option<&str>,
    source: &PatchSource,
) -> Option<String> {
    let comments = match source {
        PatchSource::PullRequest {
            owner,
            repo,
            number,
        } => fetch_pull_request(client, token, owner, repo, *number).await,
        PatchSource::Commit { owner, repo, sha } => {
            fetch_commit(client, token, owner, repo, sha).await
        }
        PatchSource::PhabricatorDiff { .. } => {
            // Conduit requires authenticated API access; skip rather than guess.
            println!(
                "Note: Phabricator comment fetching requires API authentication (not yet implemented)"
            );
            Vec::new()
        }
    };

    if comments.is_empty() {
        return None;
    }

    let banner = "=".repeat(80);
    Some(format!(
        "\n\n{banner}\nEXISTING COMMENTS/REVIEWS:\n{banner}\n\n{}\n\n{banner}\n",
        comments.join("\n\n---\n\n")
    ))
}

async fn fetch_pull_request(
    client: &reqwest::Client,
    token: Option<&str>,
    owner: &str,
    repo: &str,
    number: u64,
) -> Vec<String> {
    let mut all = Vec::new();
    let base = format!("https://api.github.com/repos/{owner}/{repo}");

    // Inline code comments
    match get_json::<Vec<ReviewComment>>(
        client,
        token,
        &format!("{base}/pulls/{number}/comments"),
    )
    .await
    {
        Ok(comments) => {
            for c in comments {
                all.push(format!(
                    "Review comment by {} on {}:{}\n{}",
                    login(&c.user),
                    c.path.as_deref().unwrap_or("N/A"),
                    c.line.map_or_else(|| "N/A".to_string(), |l| l.to_string()),
                    c.body.as_deref().unwrap_or(""),
                ));
            }
        }
        Err(e) => warn!("failed to fetch PR review comments: {e}"),
    }

    // General discussion comments
    match get_json::<Vec<IssueComment>>(
        client,
        token,
        &format!("{base}/issues/{number}/comments"),
    )
    .await
    {
        Ok(comments) => {
            for c in comments {
                all.push(format!(
                    "General comment by {}\n{}",
                    login(&c.user),
                    c.body.as_deref().unwrap_or(""),
                ));
            }
        }
        Err(e) => warn!("failed to fetch PR discussion comments: {e}"),
    }

    // Reviews (approve / request changes / comment)
    match get_json::<Vec<Review>>(client, token, &format!("{base}/pulls/{number}/reviews")).await {
        Ok(reviews) => {
            for r in reviews {
                let body = r.body.as_deref().unwrap_or("");
                if body.is_empty() {
                    continue;
                }
                all.push(format!(
                    "Review by {} ({})\n{body}",
                    login(&r.user),
                    r.state.as_deref().unwrap_or("COMMENTED"),
                ));
            }
        }
        Err(e) => warn!("failed to fetch PR reviews: {e}"),
    }

    all
}

async fn fetch_commit(
    client: &reqwest::Client,
    token: Option<&str>,
    owner: &str,
    repo: &str,
    sha: &str,
) -> Vec<String> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/commits/{sha}/comments");
    match get_json::<Vec<ReviewComment>>(client, token, &url).await {
        Ok(comments) => comments
            .iter()
            .map(|c| {
                format!(
                    "Comment by {} on {}:{}\n{}",
                    login(&c.user),
                    c.path.as_deref().unwrap_or("N/A"),
                    c.line.map_or_else(|| "N/A".to_string(), |l| l.to_string()),
                    c.body.as_deref().unwrap_or(""),
                )
            })
            .collect(),
        Err(e) => {
            warn!("failed to fetch commit comments: {e}");
            Vec::new()
        }
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    token: Option<&str>,
    url: &str,
) -> Result<T, reqwest::Error> {
    debug!(%url, "fetching comments");
    let mut request = client.get(url).header("User-Agent", "patch-review");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await?.error_for_status()?.json::<T>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_comment_payload_shape() {
        let payload = r#"[
            {"user": {"login": "alice"}, "body": "off-by-one here", "path": "src/lib.rs", "line": 12},
            {"user": null, "body": null, "path": null, "line": null}
        ]"#;
        let comments: Vec<ReviewComment> = serde_json::from_str(payload).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(login(&comments[0].user), "alice");
        assert_eq!(comments[0].line, Some(12));
        assert_eq!(login(&comments[1].user), "Unknown");
    }

    #[test]
    fn test_review_payload_shape() {
        let payload = r#"[{"user": {"login": "bob"}, "state": "APPROVED", "body": "LGTM"}]"#;
        let reviews: Vec<Review> = serde_json::from_str(payload).unwrap();
        assert_eq!(reviews[0].state.as_deref(), Some("APPROVED"));
        assert_eq!(reviews[0].body.as_deref(), Some("LGTM"));
    }

    #[test]
    fn test_login_fallback() {
        assert_eq!(login(&None), "Unknown");
        assert_eq!(login(&Some(User { login: None })), "Unknown");
        assert_eq!(
            login(&Some(User {
                login: Some("alice".to_string())
            })),
            "alice"
        );
    }
}
