pub mod comments;
pub mod download;
pub mod types;

pub use types::{PatchSource, RepoLocator};

use thiserror::Error;

/// Mozilla's Phabricator instance reviews patches for the Firefox repository;
/// the mapping to the upstream GitHub mirror is a fixed convention.
const FIREFOX_REMOTE: &str = "https://github.com/mozilla-firefox/firefox/";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(
        "Unsupported URL: {0} (expected a GitHub PR/commit URL or a Phabricator differential URL)"
    )]
    UnsupportedUrl(String),

    #[error("Failed to download patch from {url}: {source}")]
    Download {
        url: String,
        source: reqwest::Error,
    },

    #[error("Patch download from {url} returned an empty body")]
    EmptyPatch { url: String },
}

/// Resolve a URL to the repository it refers to.
///
/// Any GitHub URL with at least `/{owner}/{repo}` resolves, whether or not
/// the rest of the path names a downloadable patch. Mozilla Phabricator URLs
/// resolve to the fixed Firefox locator. Everything else is `None` — never a
/// guessed locator.
pub fn resolve(url: &str) -> Option<RepoLocator> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    if host == "github.com" {
        let segments: Vec<_> = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 2 {
            return None;
        }
        let owner = segments[0].to_string();
        let repo = segments[1].trim_end_matches(".git").to_string();
        return Some(RepoLocator {
            remote_url: format!("https://github.com/{owner}/{repo}.git"),
            owner,
            repo,
        });
    }

    if host.contains("phabricator") && host.contains("mozilla") {
        return Some(RepoLocator {
            remote_url: FIREFOX_REMOTE.to_string(),
            owner: "mozilla-firefox".to_string(),
            repo: "firefox".to_string(),
        });
    }

    None
}

/// Classify a URL as a downloadable patch source.
///
/// Stricter than [`resolve`]: a GitHub URL must name a pull request or a
/// commit. Trailing path segments (e.g. `/pull/42/files`) are tolerated;
/// query strings and fragments never affect the result.
pub fn classify(url: &str) -> Option<PatchSource> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let segments: Vec<_> = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    if host == "github.com" {
        if segments.len() < 4 {
            return None;
        }
        let owner = segments[0].to_string();
        let repo = segments[1].trim_end_matches(".git").to_string();
        match segments[2] {
            "pull" => {
                let number = segments[3].parse::<u64>().ok()?;
                return Some(PatchSource::PullRequest {
                    owner,
                    repo,
                    number,
                });
            }
            "commit" => {
                let sha = segments[3];
                if sha.is_empty() || !sha.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
                    return None;
                }
                return Some(PatchSource::Commit {
                    owner,
                    repo,
                    sha: sha.to_string(),
                });
            }
            _ => return None,
        }
    }

    if host.contains("phabricator") && host.contains("mozilla") {
        // The differential id may appear anywhere in the path.
        for segment in segments {
            if let Some(digits) = segment.strip_prefix('D') {
                if let Ok(id) = digits.parse::<u64>() {
                    return Some(PatchSource::PhabricatorDiff {
                        base_url: format!("{}://{}", parsed.scheme(), host),
                        id,
                    });
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_github_pr_url() {
        let locator = resolve("https://github.com/acme/widget/pull/42").unwrap();
        assert_eq!(locator.remote_url, "https://github.com/acme/widget.git");
        assert_eq!(locator.owner, "acme");
        assert_eq!(locator.repo, "widget");
    }

    #[test]
    fn test_resolve_github_commit_url() {
        let locator = resolve("https://github.com/acme/widget/commit/deadbeef").unwrap();
        assert_eq!(locator.owner, "acme");
        assert_eq!(locator.repo, "widget");
    }

    #[test]
    fn test_resolve_ignores_query_and_fragment() {
        let locator = resolve("https://github.com/acme/widget/pull/42?w=1#discussion").unwrap();
        assert_eq!(locator.owner, "acme");
        assert_eq!(locator.repo, "widget");
    }

    #[test]
    fn test_resolve_strips_git_suffix() {
        let locator = resolve("https://github.com/acme/widget.git/pull/42").unwrap();
        assert_eq!(locator.repo, "widget");
        assert_eq!(locator.remote_url, "https://github.com/acme/widget.git");
    }

    #[test]
    fn test_resolve_mozilla_phabricator_is_fixed() {
        for url in [
            "https://phabricator.services.mozilla.com/D123456",
            "https://phabricator.services.mozilla.com/D1",
        ] {
            let locator = resolve(url).unwrap();
            assert_eq!(locator.owner, "mozilla-firefox");
            assert_eq!(locator.repo, "firefox");
            assert_eq!(locator.remote_url, "https://github.com/mozilla-firefox/firefox/");
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_hosts_and_short_paths() {
        assert!(resolve("https://example.com/acme/widget/pull/42").is_none());
        assert!(resolve("https://github.com/acme").is_none());
        assert!(resolve("https://phabricator.example.com/D123").is_none());
        assert!(resolve("not a url").is_none());
    }

    #[test]
    fn test_classify_pull_request() {
        let source = classify("https://github.com/acme/widget/pull/42").unwrap();
        assert_eq!(
            source,
            PatchSource::PullRequest {
                owner: "acme".to_string(),
                repo: "widget".to_string(),
                number: 42,
            }
        );
    }

    #[test]
    fn test_classify_pull_request_with_trailing_segments() {
        let source = classify("https://github.com/acme/widget/pull/42/files").unwrap();
        assert!(matches!(source, PatchSource::PullRequest { number: 42, .. }));
    }

    #[test]
    fn test_classify_commit() {
        let source = classify("https://github.com/acme/widget/commit/0a1b2c3d4e5f").unwrap();
        assert_eq!(
            source,
            PatchSource::Commit {
                owner: "acme".to_string(),
                repo: "widget".to_string(),
                sha: "0a1b2c3d4e5f".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_rejects_non_hex_commit() {
        assert!(classify("https://github.com/acme/widget/commit/not-a-sha").is_none());
        assert!(classify("https://github.com/acme/widget/commit/DEADBEEF").is_none());
    }

    #[test]
    fn test_classify_rejects_other_github_paths() {
        assert!(classify("https://github.com/acme/widget").is_none());
        assert!(classify("https://github.com/acme/widget/issues/7").is_none());
        assert!(classify("https://github.com/acme/widget/pull/abc").is_none());
    }

    #[test]
    fn test_classify_phabricator_diff() {
        let source = classify("https://phabricator.services.mozilla.com/D123456").unwrap();
        assert_eq!(
            source,
            PatchSource::PhabricatorDiff {
                base_url: "https://phabricator.services.mozilla.com".to_string(),
                id: 123456,
            }
        );
    }

    #[test]
    fn test_classify_phabricator_diff_id_anywhere_in_path() {
        let source =
            classify("https://phabricator.services.mozilla.com/differential/D98765").unwrap();
        assert!(matches!(source, PatchSource::PhabricatorDiff { id: 98765, .. }));
    }

    #[test]
    fn test_classify_rejects_phabricator_without_diff_id() {
        assert!(classify("https://phabricator.services.mozilla.com/feed/").is_none());
    }
}
