//! Assembly of the analysis prompt handed to the analyzer.

/// Everything that feeds into one analysis prompt.
pub struct PromptInputs<'a> {
    pub language: &'a str,
    pub url: &'a str,
    /// Raw patch text to embed. `None` means the patch is applied in the
    /// working tree and the analyzer should read it with `git diff`.
    pub patch_text: Option<&'a str>,
    pub previous_review: Option<&'a str>,
    pub existing_comments: Option<&'a str>,
    pub custom_questions: Option<&'a str>,
}

pub fn build(inputs: &PromptInputs<'_>) -> String {
    let banner = "=".repeat(80);
    let mut prompt = format!(
        "I am a {} developer, I need to review this patch from: {}\n\n",
        inputs.language, inputs.url
    );

    match inputs.patch_text {
        Some(patch) => {
            prompt.push_str("Here is the patch content:\n```patch\n");
            prompt.push_str(patch);
            if !patch.ends_with('\n') {
                prompt.push('\n');
            }
            prompt.push_str("```\n\n");
        }
        None => {
            prompt.push_str("Load the current changes with 'git diff' and analyze them.\n\n");
        }
    }

    if let Some(previous) = inputs.previous_review {
        prompt.push_str(&format!("\n{banner}\nPREVIOUS REVIEW:\n{banner}\n\n"));
        prompt.push_str(previous);
        prompt.push_str(&format!(
            "\n\n{banner}\n\
             Please compare the current patch with the previous review above.\n\
             Note any improvements made, remaining issues, and new concerns.\n\
             {banner}\n\n"
        ));
    }

    if let Some(comments) = inputs.existing_comments {
        prompt.push_str(comments);
        prompt.push_str(
            "\nPlease consider the above existing comments/reviews when providing your analysis.\n\n",
        );
    }

    prompt.push_str(
        r#"Analyze the patch overall and answer these questions:
* What does this patch do? Provide a brief summary.
* Propose specific improvements to this patch. Be concrete and actionable - provide exact code snippets showing how to implement the improvements.
* Identify and suggest how to reduce any code duplication. Show the exact refactored code.
* Propose specific performance improvements if applicable. Include concrete code examples.
* Identify potential bugs or edge cases not handled, and suggest how to fix them. Provide the actual code fix.
* Propose refactoring opportunities that would improve code quality, readability, or maintainability. Show before/after code examples with the concrete changes.

IMPORTANT: For every issue or improvement you identify, provide concrete code examples showing exactly how to fix it. Don't just describe what should be done - show the actual code.

Note: Focus your analysis on the implementation code. Keep test analysis brief - only mention critical issues in test code.

At the end of the output, provide LINE-BY-LINE FEEDBACK for ISSUES ONLY (no positive feedback) in this format:
filename:line_number severity "comment"

Severity levels: "PEDANTIC", "LOW", "MEDIUM", "HIGH"

Only include lines that have problems, potential bugs, improvements needed, pedantic, deduplication or other issues.
For example:
src/main.rs:45 LOW "Consider using unwrap_or_else() instead of unwrap() to handle potential errors"
lib/parser.rs:123 HIGH "This variable name 'x' is not descriptive"

If there are no issues with specific lines, just write "No line-specific issues found."

"#,
    );

    if let Some(questions) = inputs.custom_questions {
        prompt.push_str(&format!("\n\nAdditional questions:\n{questions}"));
    }

    prompt.push_str(
        r#"

At the end, please provide a SIMPLIFIED SUMMARY section with:
--- COPY-PASTE SUMMARY START ---
[A concise review summary that can be posted as a comment, including:
- Key findings (improvements needed, bugs, performance issues)
- Overall assessment (LGTM with minor suggestions / Needs changes / etc.)
]
--- COPY-PASTE SUMMARY END ---"#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>() -> PromptInputs<'a> {
        PromptInputs {
            language: "Rust",
            url: "https://github.com/acme/widget/pull/42",
            patch_text: None,
            previous_review: None,
            existing_comments: None,
            custom_questions: None,
        }
    }

    #[test]
    fn test_applied_patch_reads_from_git_diff() {
        let prompt = build(&inputs());
        assert!(prompt.contains("Load the current changes with 'git diff'"));
        assert!(!prompt.contains("```patch"));
    }

    #[test]
    fn test_unapplied_patch_is_embedded() {
        let mut inputs = inputs();
        inputs.patch_text = Some("--- a/src/lib.rs\n+++ b/src/lib.rs\n");
        let prompt = build(&inputs);
        assert!(prompt.contains("```patch\n--- a/src/lib.rs"));
        assert!(!prompt.contains("Load the current changes"));
    }

    #[test]
    fn test_previous_review_block_included() {
        let mut inputs = inputs();
        inputs.previous_review = Some("Looked fine last time.");
        let prompt = build(&inputs);
        assert!(prompt.contains("PREVIOUS REVIEW:"));
        assert!(prompt.contains("Looked fine last time."));
        assert!(prompt.contains("compare the current patch with the previous review"));
    }

    #[test]
    fn test_comments_and_questions_included() {
        let mut inputs = inputs();
        inputs.existing_comments = Some("EXISTING COMMENTS/REVIEWS:\nlooks wrong");
        inputs.custom_questions = Some("Is the locking correct?");
        let prompt = build(&inputs);
        assert!(prompt.contains("looks wrong"));
        assert!(prompt.contains("Additional questions:\nIs the locking correct?"));
    }

    #[test]
    fn test_language_and_url_in_header() {
        let mut inputs = inputs();
        inputs.language = "C++";
        let prompt = build(&inputs);
        assert!(prompt.starts_with("I am a C++ developer"));
        assert!(prompt.contains("https://github.com/acme/widget/pull/42"));
    }

    #[test]
    fn test_summary_footer_present() {
        let prompt = build(&inputs());
        assert!(prompt.contains("--- COPY-PASTE SUMMARY START ---"));
        assert!(prompt.contains("LINE-BY-LINE FEEDBACK"));
    }
}
