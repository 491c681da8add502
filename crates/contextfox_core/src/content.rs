//! Story text, either a single blob or numbered parts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The raw story text handed to the pipeline.
///
/// # Examples
///
/// ```
/// use contextfox_core::StoryContent;
///
/// let content = StoryContent::from_parts(["X\nY", "Z"]);
/// assert!(content.is_partitioned());
/// assert_eq!(content.total_parts(), 2);
/// assert_eq!(content.part(2), Some("Z"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryContent {
    /// Non-partitioned text, always part 1
    Single(String),
    /// Ordered part number to text
    Parts(BTreeMap<u32, String>),
}

impl StoryContent {
    /// Number parts sequentially from 1.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Parts(
            parts
                .into_iter()
                .enumerate()
                .map(|(i, text)| (i as u32 + 1, text.into()))
                .collect(),
        )
    }

    /// Whether the content is split into numbered parts.
    pub fn is_partitioned(&self) -> bool {
        matches!(self, StoryContent::Parts(_))
    }

    /// Highest part number, 1 for single content.
    pub fn total_parts(&self) -> u32 {
        match self {
            StoryContent::Single(_) => 1,
            StoryContent::Parts(parts) => parts.keys().next_back().copied().unwrap_or(0),
        }
    }

    /// Text of a part. Single content only has part 1.
    pub fn part(&self, number: u32) -> Option<&str> {
        match self {
            StoryContent::Single(text) if number == 1 => Some(text.as_str()),
            StoryContent::Single(_) => None,
            StoryContent::Parts(parts) => parts.get(&number).map(String::as_str),
        }
    }

    /// All blobs in order.
    pub fn blobs(&self) -> Vec<&str> {
        match self {
            StoryContent::Single(text) => vec![text.as_str()],
            StoryContent::Parts(parts) => parts.values().map(String::as_str).collect(),
        }
    }
}
