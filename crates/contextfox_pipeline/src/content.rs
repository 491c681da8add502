//! Finding the unprocessed tail of a story.

use contextfox_core::StoryContent;
use contextfox_error::{PipelineError, PipelineErrorKind};
use tracing::debug;

/// The next chunk to process and where processing will stand afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Text to send to the models
    pub content: String,
    /// Last non-empty line of `content`
    pub new_last_line: String,
    /// Part the chunk came from
    pub new_part: u32,
}

/// Everything after the last occurrence of `last_line`, trimmed.
///
/// An empty or unmatched marker selects the whole text.
fn tail_after(text: &str, last_line: &str) -> String {
    if last_line.is_empty() {
        return text.trim().to_string();
    }
    match text.rfind(last_line) {
        Some(index) => text[index + last_line.len()..].trim().to_string(),
        None => {
            debug!("Marker not found in text, using the whole text");
            text.trim().to_string()
        }
    }
}

fn last_non_empty_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim_end)
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

fn extraction(content: String, new_part: u32) -> Extraction {
    Extraction {
        new_last_line: last_non_empty_line(&content),
        content,
        new_part,
    }
}

/// Compute the next chunk to process.
///
/// For partitioned content an exhausted part advances to the next one,
/// whose full text becomes the chunk. Re-running with the marker this
/// returns and no new text always fails with `NoNewContent`.
///
/// # Examples
///
/// ```
/// use contextfox_core::StoryContent;
/// use contextfox_pipeline::extract_new_content;
///
/// let story = StoryContent::Single("A\nB\nC".into());
/// let first = extract_new_content(&story, "", 1).unwrap();
/// assert_eq!(first.content, "A\nB\nC");
/// assert_eq!(first.new_last_line, "C");
/// assert!(extract_new_content(&story, &first.new_last_line, 1).is_err());
/// ```
#[track_caller]
pub fn extract_new_content(
    story: &StoryContent,
    last_line: &str,
    current_part: u32,
) -> Result<Extraction, PipelineError> {
    match story {
        StoryContent::Single(text) => {
            let chunk = tail_after(text, last_line);
            if chunk.is_empty() {
                return Err(PipelineError::new(PipelineErrorKind::NoNewContent));
            }
            Ok(extraction(chunk, 1))
        }
        StoryContent::Parts(parts) => {
            let text = parts.get(&current_part).ok_or_else(|| {
                PipelineError::new(PipelineErrorKind::PartNotFound(current_part))
            })?;
            let chunk = tail_after(text, last_line);
            if !chunk.is_empty() {
                return Ok(extraction(chunk, current_part));
            }

            let next_part = current_part + 1;
            if next_part > story.total_parts() {
                return Err(PipelineError::new(PipelineErrorKind::NoNewContent));
            }
            let next = parts
                .get(&next_part)
                .ok_or_else(|| PipelineError::new(PipelineErrorKind::PartNotFound(next_part)))?;
            debug!(from = current_part, to = next_part, "Part exhausted, advancing");
            let chunk = next.trim().to_string();
            if chunk.is_empty() {
                return Err(PipelineError::new(PipelineErrorKind::NoNewContent));
            }
            Ok(extraction(chunk, next_part))
        }
    }
}

/// `" (n/total)"` for partitioned content, empty otherwise.
pub fn part_indicator(story: &StoryContent, part: u32) -> String {
    if story.is_partitioned() {
        format!(" ({}/{})", part, story.total_parts())
    } else {
        String::new()
    }
}
