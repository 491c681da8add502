//! Story cards and their classification.

use serde::{Deserialize, Serialize};

/// A titled unit of extracted narrative metadata.
///
/// Field names follow the AI Dungeon story-card export format so card
/// lists can be imported and exported unchanged.
///
/// # Examples
///
/// ```
/// use contextfox_core::{CardKind, StoryCard};
///
/// let card = StoryCard::new("Mira", "character");
/// assert_eq!(card.kind(), CardKind::Regular);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCard {
    /// Identity key, case-sensitive
    pub title: String,
    /// Comma-joined trigger terms
    #[serde(default)]
    pub keys: String,
    /// Body text
    #[serde(default)]
    pub value: String,
    /// Card category (character, location, faction, brain...)
    #[serde(rename = "type", default)]
    pub card_type: String,
    /// Free text, may itself encode JSON with a `core_self` field
    #[serde(default)]
    pub description: String,
    /// Whether AI Dungeon offers this card during character creation
    #[serde(default)]
    pub use_for_character_creation: bool,
    /// Core self blurb, when kept as a dedicated field
    #[serde(rename = "core_self", default, skip_serializing_if = "Option::is_none")]
    pub core_self: Option<String>,
}

impl StoryCard {
    /// Create an empty card with a title and type.
    pub fn new(title: impl Into<String>, card_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            card_type: card_type.into(),
            ..Default::default()
        }
    }

    /// Classification of this card.
    pub fn kind(&self) -> CardKind {
        CardKind::classify(&self.title, &self.card_type)
    }

    /// Build a new card from a partial update, leaving absent fields empty.
    pub fn from_update(update: CardUpdate) -> Self {
        let mut card = Self {
            title: update.title.clone(),
            ..Default::default()
        };
        card.apply(update);
        card
    }

    /// Overwrite only the fields present on `update`.
    pub fn apply(&mut self, update: CardUpdate) {
        if let Some(keys) = update.keys {
            self.keys = keys;
        }
        if let Some(value) = update.value {
            self.value = value;
        }
        if let Some(card_type) = update.card_type {
            self.card_type = card_type;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(core_self) = update.core_self {
            self.core_self = Some(core_self);
        }
    }
}

/// A partial card as returned by a model.
///
/// Absent fields are `None` and never blank out existing values on merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardUpdate {
    /// Title of the card to create or update
    pub title: String,
    /// Replacement trigger terms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    /// Replacement body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Replacement card type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    /// Replacement description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement core self
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_self: Option<String>,
}

impl CardUpdate {
    /// An update that only names a card.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// How a card participates in generation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum CardKind {
    /// Holds a character's core self; default-excluded
    Brain,
    /// Scenario configuration card; default-excluded
    Configuration,
    /// Ordinary character, location or concept card
    Regular,
}

impl CardKind {
    /// The single classifier for card kinds.
    ///
    /// Brain cards have "brain" in the title (any case) or a type of
    /// "brain". Configuration cards have "Configure" in the title.
    pub fn classify(title: &str, card_type: &str) -> Self {
        if title.to_lowercase().contains("brain") || card_type.eq_ignore_ascii_case("brain") {
            CardKind::Brain
        } else if title.contains("Configure") {
            CardKind::Configuration
        } else {
            CardKind::Regular
        }
    }

    /// Whether cards of this kind are hidden from generation unless included.
    pub fn is_default_excluded(self) -> bool {
        !matches!(self, CardKind::Regular)
    }
}
