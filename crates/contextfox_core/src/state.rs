//! Per-story processing state.

use crate::StoryCard;
use serde::{Deserialize, Serialize};

/// Everything the pipeline has accumulated for one story.
///
/// Only the orchestrator mutates this, and only after a stage concludes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingState {
    /// Last processed line within the current part
    pub last_line: String,
    /// 1-based part index, 1 for non-partitioned content
    pub current_part: u32,
    /// Complete running summary
    pub accumulated_summary: String,
    /// All known cards, excluded ones included
    pub accumulated_cards: Vec<StoryCard>,
    /// Plot tracking notes
    pub plot_essentials: String,
    /// Perspective character, empty when unknown
    pub character: String,
    /// Story title, empty when unknown
    pub story_title: String,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            last_line: String::new(),
            current_part: 1,
            accumulated_summary: String::new(),
            accumulated_cards: Vec::new(),
            plot_essentials: String::new(),
            character: String::new(),
            story_title: String::new(),
        }
    }
}

impl ProcessingState {
    /// Whether both perspective character and title are known.
    pub fn identity_known(&self) -> bool {
        !self.character.trim().is_empty() && !self.story_title.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_at_part_one() {
        let state = ProcessingState::default();
        assert_eq!(state.current_part, 1);
        assert!(!state.identity_known());
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let state: ProcessingState = serde_json::from_str(r#"{"lastLine":"C"}"#).unwrap();
        assert_eq!(state.last_line, "C");
        assert_eq!(state.current_part, 1);
    }
}
