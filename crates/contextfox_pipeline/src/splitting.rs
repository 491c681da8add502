//! Pre-splitting content for models with small context windows.

use contextfox_core::{ModelChoice, ModelInfo, StoryContent};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Context length, in tokens, below which content is halved.
pub const DEFAULT_SPLIT_THRESHOLD: u64 = 150_000;

/// Outcome of [`apply_splitting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    /// Blobs before splitting
    pub files_before: usize,
    /// Parts after splitting
    pub parts_after: usize,
    /// Smallest context length that triggered the split
    pub min_context: u64,
}

impl SplitReport {
    /// Status line shown to the user.
    pub fn message(&self) -> String {
        format!(
            "Low context detected ({}k). Split {} file(s) into {} parts.",
            self.min_context / 1000,
            self.files_before,
            self.parts_after
        )
    }
}

/// Smallest known context window among the enabled stage models.
///
/// Disabled stages, models missing from the catalog and models reporting
/// a zero length are ignored. Returns 0 when nothing is known.
pub fn minimum_context_length<'a>(
    stage_models: impl IntoIterator<Item = &'a ModelChoice>,
    catalog: &[ModelInfo],
) -> u64 {
    stage_models
        .into_iter()
        .filter_map(ModelChoice::model_id)
        .filter_map(|id| catalog.iter().find(|m| m.id == id))
        .map(|m| m.context_length)
        .filter(|len| *len > 0)
        .min()
        .unwrap_or(0)
}

fn halve(blob: &str) -> Vec<String> {
    let lines: Vec<&str> = blob.lines().collect();
    if lines.len() < 2 {
        return vec![blob.to_string()];
    }
    let mid = lines.len() / 2;
    vec![lines[..mid].join("\n"), lines[mid..].join("\n")]
}

/// Halve every blob once when the weakest model's window is below
/// `threshold`.
///
/// The result is renumbered from 1, and single content that gets split
/// becomes partitioned. Content is returned untouched (with no report)
/// when no split is needed.
pub fn apply_splitting(
    content: StoryContent,
    min_context: u64,
    threshold: u64,
) -> (StoryContent, Option<SplitReport>) {
    if min_context == 0 || min_context >= threshold {
        debug!(min_context, threshold, "No context split needed");
        return (content, None);
    }

    let blobs = content.blobs();
    let files_before = blobs.len();
    let parts: BTreeMap<u32, String> = blobs
        .into_iter()
        .flat_map(halve)
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, text))
        .collect();

    let report = SplitReport {
        files_before,
        parts_after: parts.len(),
        min_context,
    };
    info!(message = %report.message(), "Split content for low context model");
    (StoryContent::Parts(parts), Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, context_length: u64) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            name: String::new(),
            context_length,
        }
    }

    #[test]
    fn test_minimum_ignores_disabled_unknown_and_zero() {
        let catalog = vec![info("big", 1_000_000), info("small", 32_000), info("zero", 0)];
        let models: Vec<ModelChoice> =
            vec!["big".into(), "None".into(), "zero".into(), "mystery".into()];
        assert_eq!(minimum_context_length(&models, &catalog), 1_000_000);

        let models: Vec<ModelChoice> = vec!["big".into(), "small".into()];
        assert_eq!(minimum_context_length(&models, &catalog), 32_000);

        let models: Vec<ModelChoice> = vec!["none".into()];
        assert_eq!(minimum_context_length(&models, &catalog), 0);
    }

    #[test]
    fn test_single_content_is_promoted_and_halved() {
        let content = StoryContent::Single("1\n2\n3\n4\n5".into());
        let (split, report) = apply_splitting(content, 32_000, DEFAULT_SPLIT_THRESHOLD);
        assert_eq!(split, StoryContent::from_parts(["1\n2", "3\n4\n5"]));
        assert_eq!(
            report.unwrap().message(),
            "Low context detected (32k). Split 1 file(s) into 2 parts."
        );
    }

    #[test]
    fn test_parts_are_renumbered_sequentially() {
        let content = StoryContent::from_parts(["a\nb", "c", "d\ne\nf\ng"]);
        let (split, report) = apply_splitting(content, 64_000, DEFAULT_SPLIT_THRESHOLD);
        assert_eq!(split, StoryContent::from_parts(["a", "b", "c", "d\ne", "f\ng"]));
        assert_eq!(report.unwrap().parts_after, 5);
    }

    #[test]
    fn test_no_split_at_or_above_threshold_or_unknown() {
        let content = StoryContent::Single("1\n2".into());
        let (same, report) = apply_splitting(content.clone(), 150_000, DEFAULT_SPLIT_THRESHOLD);
        assert_eq!(same, content);
        assert!(report.is_none());
        let (same, report) = apply_splitting(content.clone(), 0, DEFAULT_SPLIT_THRESHOLD);
        assert_eq!(same, content);
        assert!(report.is_none());
    }
}
