//! Which cards are hidden from generation tasks.

use crate::StoryCard;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User overrides on top of the default exclusion rule.
///
/// A card is excluded iff it is not in `included_card_titles` and either
/// its kind is default-excluded or it is in `excluded_card_titles`.
///
/// # Examples
///
/// ```
/// use contextfox_core::{ExclusionState, StoryCard};
///
/// let brain = StoryCard::new("Mira Brain", "brain");
/// let mut exclusions = ExclusionState::default();
/// assert!(exclusions.is_excluded(&brain));
///
/// exclusions.include("Mira Brain");
/// assert!(!exclusions.is_excluded(&brain));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionState {
    /// Cards the user has excluded
    #[serde(default)]
    pub excluded_card_titles: BTreeSet<String>,
    /// Default-excluded cards the user has opted back in
    #[serde(default)]
    pub included_card_titles: BTreeSet<String>,
}

impl ExclusionState {
    /// Whether `card` is hidden from generation and protected from overwrite.
    pub fn is_excluded(&self, card: &StoryCard) -> bool {
        if self.included_card_titles.contains(&card.title) {
            return false;
        }
        card.kind().is_default_excluded() || self.excluded_card_titles.contains(&card.title)
    }

    /// Mark a title as user-excluded.
    pub fn exclude(&mut self, title: impl Into<String>) {
        self.excluded_card_titles.insert(title.into());
    }

    /// Override a default exclusion for a title.
    pub fn include(&mut self, title: impl Into<String>) {
        self.included_card_titles.insert(title.into());
    }

    /// Flip the exclusion of `card`, returning whether it is now excluded.
    ///
    /// Default-excluded cards toggle the include override; regular cards
    /// toggle the user exclusion.
    pub fn toggle(&mut self, card: &StoryCard) -> bool {
        let set = if card.kind().is_default_excluded() {
            &mut self.included_card_titles
        } else {
            &mut self.excluded_card_titles
        };
        if !set.remove(&card.title) {
            set.insert(card.title.clone());
        }
        self.is_excluded(card)
    }
}
