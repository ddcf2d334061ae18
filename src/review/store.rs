//! Persistence of review output under `./reviews/`, one file per patch
//! source, overwritten on each run. A previous review, when present, is fed
//! back into the next prompt so the analyzer can compare.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::source::PatchSource;

const REVIEWS_DIR: &str = "reviews";

fn review_path_in(dir: &Path, source: &PatchSource) -> PathBuf {
    dir.join(format!("{}-latest.txt", source.identifier()))
}

/// Load the previous review for this patch, if one was saved.
pub fn load_previous(source: &PatchSource) -> Option<String> {
    load_previous_from(Path::new(REVIEWS_DIR), source)
}

fn load_previous_from(dir: &Path, source: &PatchSource) -> Option<String> {
    let path = review_path_in(dir, source);
    let content = fs::read_to_string(&path).ok()?;

    if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
        let date: DateTime<Local> = modified.into();
        println!(
            "\nFound previous review from {}",
            date.format("%Y-%m-%d %H:%M:%S")
        );
        println!("Review file: {}\n", path.display());
    }

    Some(content)
}

/// Persist the review output with a timestamp header. Failure to save is a
/// warning, never fatal.
pub fn save(source: &PatchSource, url: &str, output: &str) {
    save_in(Path::new(REVIEWS_DIR), source, url, output)
}

fn save_in(dir: &Path, source: &PatchSource, url: &str, output: &str) {
    let path = review_path_in(dir, source);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let header = format!(
        "Review generated: {timestamp}\nPatch URL: {url}\n\n{}\n\n",
        "=".repeat(80)
    );

    let result = fs::create_dir_all(dir).and_then(|()| fs::write(&path, format!("{header}{output}")));
    match result {
        Ok(()) => println!("\nReview saved to: {}", path.display()),
        Err(e) => warn!("failed to save review output: {e}"),
    }
}
