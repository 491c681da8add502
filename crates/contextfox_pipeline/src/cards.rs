//! Card filtering, projection and merging.

use crate::parsing::CoreSelfUpdate;
use contextfox_core::{CardKind, CardUpdate, ExclusionState, StoryCard};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Cards split by whether generation tasks may see and overwrite them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeparatedCards {
    /// Hidden from generation, passed through untouched
    pub excluded: Vec<StoryCard>,
    /// Shown to generation tasks and open to updates
    pub regular: Vec<StoryCard>,
}

/// Split `cards` according to `exclusions`.
pub fn separate_cards(cards: &[StoryCard], exclusions: &ExclusionState) -> SeparatedCards {
    let (excluded, regular) = cards
        .iter()
        .cloned()
        .partition(|card| exclusions.is_excluded(card));
    SeparatedCards { excluded, regular }
}

/// Title and value, for summary and plot prompts.
#[derive(Debug, Clone, Serialize)]
pub struct ContextCard<'a> {
    title: &'a str,
    value: &'a str,
}

/// Title, keys, type and value, for card-generation prompts.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationCard<'a> {
    title: &'a str,
    keys: &'a str,
    #[serde(rename = "type")]
    card_type: &'a str,
    value: &'a str,
}

/// Generation fields plus description, for the core self prompt.
#[derive(Debug, Clone, Serialize)]
pub struct CoreSelfCard<'a> {
    title: &'a str,
    keys: &'a str,
    #[serde(rename = "type")]
    card_type: &'a str,
    value: &'a str,
    description: &'a str,
}

/// Project cards for summary and plot prompts.
pub fn strip_for_context(cards: &[StoryCard]) -> Vec<ContextCard<'_>> {
    cards
        .iter()
        .map(|c| ContextCard {
            title: &c.title,
            value: &c.value,
        })
        .collect()
}

/// Project cards for character, location and concept prompts.
pub fn strip_for_card_generation(cards: &[StoryCard]) -> Vec<GenerationCard<'_>> {
    cards
        .iter()
        .map(|c| GenerationCard {
            title: &c.title,
            keys: &c.keys,
            card_type: &c.card_type,
            value: &c.value,
        })
        .collect()
}

/// Project cards for the core self prompt.
pub fn strip_for_core_self(cards: &[StoryCard]) -> Vec<CoreSelfCard<'_>> {
    cards
        .iter()
        .map(|c| CoreSelfCard {
            title: &c.title,
            keys: &c.keys,
            card_type: &c.card_type,
            value: &c.value,
            description: &c.description,
        })
        .collect()
}

/// Pretty JSON for the `$cards` slot.
pub fn cards_json<T: Serialize>(projection: &[T]) -> String {
    serde_json::to_string_pretty(projection).unwrap_or_else(|_| "[]".to_string())
}

/// Merge model updates into `existing` by title.
///
/// A matching card gets only the fields present on the update; an unknown
/// title is appended as a new card.
///
/// # Examples
///
/// ```
/// use contextfox_core::{CardUpdate, StoryCard};
/// use contextfox_pipeline::merge_cards;
///
/// let mut mira = StoryCard::new("Mira", "character");
/// mira.keys = "Mira".into();
/// let update = CardUpdate { value: Some("A thief.".into()), ..CardUpdate::titled("Mira") };
///
/// let merged = merge_cards(vec![mira], vec![update]);
/// assert_eq!(merged[0].keys, "Mira");
/// assert_eq!(merged[0].value, "A thief.");
/// ```
pub fn merge_cards(existing: Vec<StoryCard>, incoming: Vec<CardUpdate>) -> Vec<StoryCard> {
    let mut merged = existing;
    for update in incoming {
        match merged.iter_mut().find(|c| c.title == update.title) {
            Some(card) => {
                debug!(title = %update.title, "Updating card");
                card.apply(update);
            }
            None => {
                debug!(title = %update.title, "Adding card");
                merged.push(StoryCard::from_update(update));
            }
        }
    }
    merged
}

/// The card set at the end of a generation stage: regular cards with
/// updates merged in, followed by the untouched excluded cards.
pub fn finalize_cards(separated: SeparatedCards, generated: Vec<CardUpdate>) -> Vec<StoryCard> {
    // Updates aimed at an excluded card are dropped rather than duplicating it.
    let generated = generated
        .into_iter()
        .filter(|u| !separated.excluded.iter().any(|c| c.title == u.title))
        .collect();
    let mut cards = merge_cards(separated.regular, generated);
    cards.extend(separated.excluded);
    cards
}

/// Brain cards of a card set.
pub fn brain_cards(cards: &[StoryCard]) -> Vec<StoryCard> {
    cards
        .iter()
        .filter(|c| c.kind() == CardKind::Brain)
        .cloned()
        .collect()
}

/// Splice a core self into a description.
///
/// A JSON-object description gets its `core_self` key set. Plain text has
/// any leading `core_self:` block (up to the first blank line) replaced.
pub fn splice_core_self(description: &str, core_self: &str) -> String {
    if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(description) {
        map.insert("core_self".to_string(), Value::String(core_self.to_string()));
        return serde_json::to_string(&Value::Object(map))
            .unwrap_or_else(|_| description.to_string());
    }

    let rest = if description.starts_with("core_self:") {
        after_first_blank_line(description)
    } else {
        description
    };

    if rest.is_empty() {
        format!("core_self: {}", core_self)
    } else {
        format!("core_self: {}\n\n{}", core_self, rest)
    }
}

/// Text following the first whitespace-only line, with any further blank
/// lines skipped. Empty when there is no blank line.
fn after_first_blank_line(text: &str) -> &str {
    let mut offset = 0;
    let mut in_gap = false;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        let blank = line.trim().is_empty();
        if in_gap && !blank {
            return &text[offset..];
        }
        if index > 0 && blank {
            in_gap = true;
        }
        offset += line.len();
    }
    ""
}

/// Apply core self updates to matching brain cards. Returns how many
/// cards changed.
pub fn apply_core_self_updates(cards: &mut [StoryCard], updates: &[CoreSelfUpdate]) -> usize {
    let mut applied = 0;
    for update in updates {
        let target = cards
            .iter_mut()
            .find(|c| c.title == update.title && c.kind() == CardKind::Brain);
        match target {
            Some(card) => {
                card.description = splice_core_self(&card.description, &update.core_self);
                applied += 1;
            }
            None => debug!(title = %update.title, "No brain card for core self update"),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(title: &str, card_type: &str) -> StoryCard {
        StoryCard {
            title: title.into(),
            card_type: card_type.into(),
            keys: format!("{title} keys"),
            value: format!("{title} value"),
            description: format!("{title} description"),
            ..Default::default()
        }
    }

    #[test]
    fn test_partial_merge_only_replaces_value() {
        let existing = vec![card("Mira", "character")];
        let merged = merge_cards(
            existing,
            vec![CardUpdate {
                value: Some("new".into()),
                ..CardUpdate::titled("Mira")
            }],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "new");
        assert_eq!(merged[0].keys, "Mira keys");
        assert_eq!(merged[0].card_type, "character");
        assert_eq!(merged[0].description, "Mira description");
    }

    #[test]
    fn test_merge_appends_unknown_titles_and_is_case_sensitive() {
        let merged = merge_cards(
            vec![card("Mira", "character")],
            vec![CardUpdate {
                value: Some("x".into()),
                ..CardUpdate::titled("mira")
            }],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].title, "mira");
        assert_eq!(merged[1].keys, "");
    }

    #[test]
    fn test_brain_cards_are_separated_unless_included() {
        let cards = vec![
            card("Mira", "character"),
            card("MIRA BRAIN", "character"),
            card("Configure Rules", "other"),
            card("Docks", "location"),
        ];
        let mut exclusions = ExclusionState::default();
        exclusions.exclude("Docks");

        let separated = separate_cards(&cards, &exclusions);
        let regular: Vec<_> = separated.regular.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(regular, vec!["Mira"]);
        assert_eq!(separated.excluded.len(), 3);

        exclusions.include("MIRA BRAIN");
        let separated = separate_cards(&cards, &exclusions);
        assert!(separated.regular.iter().any(|c| c.title == "MIRA BRAIN"));
    }

    #[test]
    fn test_finalize_keeps_excluded_cards_untouched() {
        let cards = vec![card("Mira", "character"), card("Mira Brain", "brain")];
        let separated = separate_cards(&cards, &ExclusionState::default());
        let updates = vec![
            CardUpdate {
                value: Some("hijack".into()),
                ..CardUpdate::titled("Mira Brain")
            },
            CardUpdate {
                value: Some("new".into()),
                ..CardUpdate::titled("Kane")
            },
        ];
        let final_cards = finalize_cards(separated, updates);
        let titles: Vec<_> = final_cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Mira", "Kane", "Mira Brain"]);
        assert_eq!(final_cards[2].value, "Mira Brain value");
    }

    #[test]
    fn test_projections_carry_only_their_fields() {
        let cards = vec![card("Mira", "character")];
        let context = serde_json::to_value(strip_for_context(&cards)).unwrap();
        assert_eq!(context[0].as_object().unwrap().len(), 2);
        let generation = serde_json::to_value(strip_for_card_generation(&cards)).unwrap();
        assert_eq!(generation[0]["type"], "character");
        assert!(generation[0].get("description").is_none());
        let core = serde_json::to_value(strip_for_core_self(&cards)).unwrap();
        assert_eq!(core[0]["description"], "Mira description");
    }

    #[test]
    fn test_splice_into_json_description() {
        let spliced = splice_core_self(r#"{"notes":"x","core_self":"old"}"#, "I am new.");
        let value: Value = serde_json::from_str(&spliced).unwrap();
        assert_eq!(value["core_self"], "I am new.");
        assert_eq!(value["notes"], "x");
    }

    #[test]
    fn test_splice_replaces_leading_block() {
        assert_eq!(
            splice_core_self("core_self: old\nstill old\n\nOther notes", "new"),
            "core_self: new\n\nOther notes"
        );
        assert_eq!(splice_core_self("core_self: old only", "new"), "core_self: new");
        assert_eq!(
            splice_core_self("Plain notes", "new"),
            "core_self: new\n\nPlain notes"
        );
        assert_eq!(splice_core_self("", "new"), "core_self: new");
    }

    #[test]
    fn test_splice_keeps_notes_after_whitespace_or_crlf_gap() {
        assert_eq!(
            splice_core_self("core_self: old\n  \nUser notes", "new"),
            "core_self: new\n\nUser notes"
        );
        assert_eq!(
            splice_core_self("core_self: old\r\n\r\nUser notes", "new"),
            "core_self: new\n\nUser notes"
        );
        assert_eq!(
            splice_core_self("core_self: old\n\n \t\n\nUser notes\nmore", "new"),
            "core_self: new\n\nUser notes\nmore"
        );
        assert_eq!(
            splice_core_self("core_self: old\n\n  ", "new"),
            "core_self: new"
        );
    }

    #[test]
    fn test_core_self_only_touches_brain_cards() {
        let mut cards = vec![card("Mira", "character"), card("Mira Brain", "brain")];
        let updates = vec![
            CoreSelfUpdate {
                title: "Mira".into(),
                core_self: "no".into(),
            },
            CoreSelfUpdate {
                title: "Mira Brain".into(),
                core_self: "I survive.".into(),
            },
        ];
        assert_eq!(apply_core_self_updates(&mut cards, &updates), 1);
        assert_eq!(cards[0].description, "Mira description");
        assert_eq!(
            cards[1].description,
            "core_self: I survive.\n\nMira Brain description"
        );
    }
}
