use tracing::{debug, instrument};

use super::{PatchSource, SourceError};

/// Download the raw unified diff for a patch source.
///
/// Runs before any repository mutation, so a failure here needs no cleanup.
/// Non-2xx responses surface as [`SourceError::Download`], distinct from any
/// later apply failure.
#[instrument(skip(client))]
pub async fn download(
    client: &reqwest::Client,
    source: &PatchSource,
) -> Result<String, SourceError> {
    let url = source.patch_url();
    debug!(%url, "downloading patch");

    let text = client
        .get(&url)
        .header("User-Agent", "patch-review")
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| SourceError::Download {
            url: url.clone(),
            source,
        })?
        .text()
        .await
        .map_err(|source| SourceError::Download {
            url: url.clone(),
            source,
        })?;

    if text.trim().is_empty() {
        return Err(SourceError::EmptyPatch { url });
    }

    debug!(patch_bytes = text.len(), "downloaded patch");
    Ok(text)
}
