//! Recovery-oriented parsing of model output.
//!
//! Models are asked for JSON but often wrap it in prose, get cut off at the
//! token limit, or double-encode it. Each recovery strategy is a separate
//! function returning a typed `Result`; the `parse_*_response` functions
//! try them in order.

use contextfox_core::CardUpdate;
use contextfox_error::JsonError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

const RECOVERY_WINDOW: usize = 1000;

static TITLE_FIELD: LazyLock<Regex> = LazyLock::new(|| field_regex("title", true));

/// Which strategy produced a parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ParseTier {
    /// Strict JSON parse of the extracted payload
    Strict,
    /// Field-level regex scan
    FieldRegex,
    /// Second parse of double-encoded JSON
    Reparse,
    /// The response text itself
    Raw,
}

/// A parsed value tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    /// The value
    pub value: T,
    /// Strategy that succeeded
    pub tier: ParseTier,
}

/// One `coreSelfUpdates` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSelfUpdate {
    /// Exact brain card title
    pub title: String,
    /// New core self text
    pub core_self: String,
}

/// Cut the first bracketed region out of `text`.
///
/// Starts at the first `{` or `[` and ends at the last matching closer
/// anywhere in the text. When no closer follows the opener the expected
/// closer is appended. Text without an opener is returned unchanged.
///
/// # Examples
///
/// ```
/// use contextfox_pipeline::extract_json;
///
/// assert_eq!(extract_json(r#"garbage{"a":1}trailing"#), r#"{"a":1}"#);
/// assert_eq!(extract_json(r#"{"a":1"#), r#"{"a":1}"#);
/// ```
pub fn extract_json(text: &str) -> String {
    let brace = text.find('{');
    let bracket = text.find('[');
    let (start, closer) = match (brace, bracket) {
        (Some(b), Some(k)) if k < b => (k, ']'),
        (Some(b), _) => (b, '}'),
        (None, Some(k)) => (k, ']'),
        (None, None) => return text.to_string(),
    };

    match text.rfind(closer) {
        Some(end) if end > start => text[start..=end].to_string(),
        _ => format!("{}{}", &text[start..], closer),
    }
}

fn field_regex(field: &str, require_close: bool) -> Regex {
    let close = if require_close { "\"" } else { "\"?" };
    let pattern = format!(
        r#"(?s)"{}"\s*:\s*"((?:[^"\\]|\\.)*){}"#,
        regex::escape(field),
        close
    );
    Regex::new(&pattern).expect("Valid field regex")
}

/// Undo the JSON escapes models leave in regex-recovered text.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
        other => Some(other.to_string()),
    }
}

fn field_from_value(value: &Value, field: &str) -> Result<String, JsonError> {
    value
        .get(field)
        .and_then(value_to_text)
        .ok_or_else(|| JsonError::new(format!("missing field '{}'", field)))
}

/// Tier 1: strict parse of the extracted payload.
pub fn strict_field(text: &str, field: &str) -> Result<String, JsonError> {
    let value: Value = serde_json::from_str(&extract_json(text))
        .map_err(|e| JsonError::new(format!("strict parse failed: {}", e)))?;
    field_from_value(&value, field)
}

/// Tier 2: regex scan for `"field": "..."`, tolerating a missing closing
/// quote from a truncated stream.
pub fn regex_field(text: &str, field: &str) -> Result<String, JsonError> {
    field_regex(field, false)
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()))
        .ok_or_else(|| JsonError::new(format!("no '{}' field found", field)))
}

/// Tier 3: the whole response is itself JSON, possibly a JSON string
/// wrapping the real payload.
pub fn reparse_field(text: &str, field: &str) -> Result<String, JsonError> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('"')) {
        return Err(JsonError::new("response does not look like JSON"));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| JsonError::new(format!("reparse failed: {}", e)))?;
    match value {
        Value::String(inner) => strict_field(&inner, field),
        other => field_from_value(&other, field),
    }
}

/// Extract a text field, falling through every tier down to the raw text.
pub fn parse_text_field(text: &str, field: &str) -> Parsed<String> {
    let tiers: [(ParseTier, fn(&str, &str) -> Result<String, JsonError>); 3] = [
        (ParseTier::Strict, strict_field),
        (ParseTier::FieldRegex, regex_field),
        (ParseTier::Reparse, reparse_field),
    ];
    for (tier, strategy) in tiers {
        match strategy(text, field) {
            Ok(value) => {
                debug!(field, %tier, "Parsed response field");
                return Parsed { value, tier };
            }
            Err(e) => debug!(field, %tier, error = %e, "Parse tier failed"),
        }
    }
    warn!(field, "Falling back to raw response text");
    Parsed {
        value: text.trim().to_string(),
        tier: ParseTier::Raw,
    }
}

/// Parse a summary response.
pub fn parse_summary_response(text: &str) -> Parsed<String> {
    parse_text_field(text, "summary")
}

/// Parse a plot essentials response. Arrays are joined with blank lines.
pub fn parse_plot_essentials_response(text: &str) -> Parsed<String> {
    parse_text_field(text, "plotEssentials")
}

/// Parse a perspective or title response.
///
/// Raw text is never accepted as a name, so only the strict and regex
/// tiers run.
pub fn parse_identity_field(text: &str, field: &str) -> Option<String> {
    strict_field(text, field)
        .or_else(|_| regex_field(text, field))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn card_from_value(value: &Value) -> Option<CardUpdate> {
    let text = |key: &str| value.get(key).and_then(value_to_text);
    let title = text("title")?.trim().to_string();
    if title.is_empty() {
        return None;
    }
    let keys = match value.get("keys") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => other.and_then(value_to_text),
    };
    Some(CardUpdate {
        title,
        keys,
        value: text("value"),
        card_type: text("type"),
        description: text("description"),
        core_self: text("core_self"),
    })
}

/// Tier 1 for cards: a `cards` array in well-formed JSON.
///
/// A bare array is accepted as the card list. Well-formed JSON without a
/// `cards` key is an empty result, not an error.
pub fn strict_cards(text: &str) -> Result<Vec<CardUpdate>, JsonError> {
    let value: Value = serde_json::from_str(&extract_json(text))
        .map_err(|e| JsonError::new(format!("strict parse failed: {}", e)))?;
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("cards") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => return Err(JsonError::new("expected an object or array")),
    };
    Ok(items.iter().filter_map(card_from_value).collect())
}

fn char_floor(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Offsets of every `{` that sits outside a JSON string.
fn object_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    let mut in_string = false;
    let mut escaped = false;
    text.char_indices().filter_map(move |(index, ch)| {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => return Some(index),
            _ => {}
        }
        None
    })
}

/// Tier 2 for cards: scan for titles and look for `keys`, `value` and
/// `type` in the text that follows each one.
///
/// The window is at most 1000 characters and stops at the next title or
/// the next object opened outside a string, so braces inside values are
/// kept. Fields written before the title in the same object are also
/// found. Titles with neither `keys` nor `value` are dropped.
pub fn recover_cards(text: &str) -> Vec<CardUpdate> {
    let titles: Vec<_> = TITLE_FIELD.captures_iter(text).collect();
    let mut cards = Vec::new();

    for (i, caps) in titles.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let window_start = whole.end();
        let mut window_end = char_floor(text, window_start + RECOVERY_WINDOW);
        if let Some(next) = titles.get(i + 1).and_then(|c| c.get(0)) {
            window_end = window_end.min(next.start());
        }
        if let Some(next_object) = object_starts(&text[window_start..window_end]).next() {
            window_end = window_start + next_object;
        }
        // Fields may also precede the title inside the same object.
        let previous_end = i
            .checked_sub(1)
            .and_then(|p| titles.get(p))
            .and_then(|c| c.get(0))
            .map(|m| m.end())
            .unwrap_or(0);
        let before = &text[previous_end..whole.start()];
        let lead = match object_starts(before).last() {
            Some(object_start) => &before[object_start..],
            None => before,
        };
        let window = &text[window_start..window_end];

        let find = |field: &str| {
            regex_field(window, field)
                .ok()
                .or_else(|| regex_field(lead, field).ok())
        };
        let keys = find("keys");
        let value = find("value");
        if keys.is_none() && value.is_none() {
            continue;
        }
        cards.push(CardUpdate {
            title: unescape(title.as_str()),
            keys,
            value,
            card_type: find("type"),
            ..Default::default()
        });
    }
    cards
}

/// Parse a card-generation response. Never fails: no cards is a valid
/// outcome.
pub fn parse_cards_response(text: &str) -> Parsed<Vec<CardUpdate>> {
    match strict_cards(text) {
        Ok(value) => Parsed {
            value,
            tier: ParseTier::Strict,
        },
        Err(e) => {
            let value = recover_cards(text);
            warn!(error = %e, recovered = value.len(), "Recovered cards from malformed JSON");
            Parsed {
                value,
                tier: ParseTier::FieldRegex,
            }
        }
    }
}

/// Parse a core self response. Any failure yields no updates.
pub fn parse_core_self_response(text: &str) -> Vec<CoreSelfUpdate> {
    let Ok(value) = serde_json::from_str::<Value>(&extract_json(text)) else {
        warn!("Core self response was not valid JSON");
        return Vec::new();
    };
    let Some(Value::Array(items)) = value.get("coreSelfUpdates") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?.trim();
            let core_self = item.get("core_self")?.as_str()?.trim();
            (!title.is_empty() && !core_self.is_empty()).then(|| CoreSelfUpdate {
                title: title.to_string(),
                core_self: core_self.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_prefers_first_opener() {
        assert_eq!(extract_json(r#"x [1, {"a": 2}] y"#), r#"[1, {"a": 2}]"#);
        assert_eq!(extract_json(r#"{"a": [1]} ]"#), r#"{"a": [1]}"#);
        assert_eq!(extract_json("no json here"), "no json here");
        assert_eq!(extract_json("} then {\"a\":1"), "{\"a\":1}");
    }

    #[test]
    fn test_extract_json_uses_last_closer() {
        assert_eq!(
            extract_json(r#"{"a":1} and {"b":2} done"#),
            r#"{"a":1} and {"b":2}"#
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\nb \"q\" c\\d \t"#), "a\nb \"q\" c\\d \\t");
    }

    #[test]
    fn test_summary_strict_tier() {
        let parsed = parse_summary_response("Sure!\n{\"summary\": \"You woke.\"}");
        assert_eq!(parsed.value, "You woke.");
        assert_eq!(parsed.tier, ParseTier::Strict);
    }

    #[test]
    fn test_summary_regex_tier_on_truncation() {
        let parsed = parse_summary_response(r#"{"summary": "You woke.\nYou said \"hi\" and"#);
        assert_eq!(parsed.tier, ParseTier::FieldRegex);
        assert_eq!(parsed.value, "You woke.\nYou said \"hi\" and");
    }

    #[test]
    fn test_summary_reparse_tier_on_double_encoding() {
        let inner = r#"{"summary": "You woke."}"#;
        let encoded = serde_json::to_string(inner).unwrap();
        assert_eq!(reparse_field(&encoded, "summary").unwrap(), "You woke.");
        let parsed = parse_summary_response(&encoded);
        assert_eq!(parsed.value, "You woke.");
        assert_eq!(parsed.tier, ParseTier::Reparse);
    }

    #[test]
    fn test_summary_raw_tier() {
        let parsed = parse_summary_response("  You woke in a cave.  ");
        assert_eq!(parsed.tier, ParseTier::Raw);
        assert_eq!(parsed.value, "You woke in a cave.");
    }

    #[test]
    fn test_plot_essentials_array_is_joined() {
        let parsed =
            parse_plot_essentials_response(r#"{"plotEssentials": ["- debt to Kane", "- storm coming"]}"#);
        assert_eq!(parsed.value, "- debt to Kane\n\n- storm coming");
    }

    #[test]
    fn test_cards_strict_with_keys_array() {
        let parsed = parse_cards_response(
            r#"{"cards": [{"title": "Mira", "keys": ["Mira", "thief"], "value": "A thief.", "type": "character"}, {"value": "no title"}]}"#,
        );
        assert_eq!(parsed.tier, ParseTier::Strict);
        assert_eq!(parsed.value.len(), 1);
        assert_eq!(parsed.value[0].keys.as_deref(), Some("Mira, thief"));
        assert_eq!(parsed.value[0].description, None);
    }

    #[test]
    fn test_cards_without_cards_key_are_empty() {
        assert!(parse_cards_response(r#"{"note": "nothing changed"}"#).value.is_empty());
    }

    #[test]
    fn test_truncated_cards_recover_complete_entries() {
        let text = r#"{"cards": [{"keys": "Mira, thief", "value": "A thief.", "type": "character", "title": "Mira"}, {"title": "Kane", "value": "A smug"#;
        let parsed = parse_cards_response(text);
        assert_eq!(parsed.tier, ParseTier::FieldRegex);
        let mira = parsed.value.iter().find(|c| c.title == "Mira").unwrap();
        assert_eq!(mira.value.as_deref(), Some("A thief."));
        assert_eq!(mira.keys.as_deref(), Some("Mira, thief"));
        assert_eq!(mira.card_type.as_deref(), Some("character"));
    }

    #[test]
    fn test_recovery_does_not_borrow_next_cards_fields() {
        let text = r#"[{"title": "A", "keys": "a"}, {"title": "B", "value": "b"},"#;
        let cards = recover_cards(text);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].value, None);
        assert_eq!(cards[1].keys, None);
    }

    #[test]
    fn test_recovery_with_title_last_layout() {
        let text = r#"{"cards": [{"keys": "a", "value": "A", "title": "A"}, {"keys": "b", "value": "B", "title": "B"}, {"keys": "c", "val"#;
        let cards = recover_cards(text);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].keys.as_deref(), Some("a"));
        assert_eq!(cards[1].value.as_deref(), Some("B"));
    }

    #[test]
    fn test_recovery_keeps_braces_inside_values() {
        let text = r#"{"cards": [{"title": "Mira", "value": "Speaks in {riddles} and \"{quotes}\"", "keys": "Mira"}, {"keys": "k", "value": "Uses {x}", "title": "Kane"}, {"title": "Docks", "val"#;
        let cards = recover_cards(text);
        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0].value.as_deref(),
            Some(r#"Speaks in {riddles} and "{quotes}""#)
        );
        assert_eq!(cards[0].keys.as_deref(), Some("Mira"));
        assert_eq!(cards[1].title, "Kane");
        assert_eq!(cards[1].keys.as_deref(), Some("k"));
        assert_eq!(cards[1].value.as_deref(), Some("Uses {x}"));
    }

    #[test]
    fn test_empty_cards_response() {
        assert!(parse_cards_response("").value.is_empty());
        assert!(recover_cards("nothing").is_empty());
    }

    #[test]
    fn test_core_self_parsing() {
        let updates = parse_core_self_response(
            r#"ok {"coreSelfUpdates": [{"title": "Mira Brain", "core_self": "I steal to survive."}, {"title": "", "core_self": "x"}]}"#,
        );
        assert_eq!(
            updates,
            vec![CoreSelfUpdate {
                title: "Mira Brain".into(),
                core_self: "I steal to survive.".into()
            }]
        );
        assert!(parse_core_self_response("not json").is_empty());
        assert!(parse_core_self_response(r#"{"coreSelfUpdates": "nope"}"#).is_empty());
    }

    #[test]
    fn test_identity_field_never_uses_raw_text() {
        assert_eq!(
            parse_identity_field(r#"{"character": " Mira "}"#, "character").as_deref(),
            Some("Mira")
        );
        assert_eq!(parse_identity_field("The hero is Mira", "character"), None);
        assert_eq!(parse_identity_field(r#"{"title": ""}"#, "title"), None);
    }
}
