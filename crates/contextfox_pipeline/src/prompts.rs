//! Typed prompt templates.
//!
//! Templates are parsed once into literal and slot segments. A `$name`
//! that does not match a known slot is rejected at parse time instead of
//! being sent to the model verbatim.

use contextfox_core::TaskKind;
use contextfox_error::{PipelineError, PipelineErrorKind};

/// Named values a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum Slot {
    /// `$model`: the story model, after alias resolution
    Model,
    /// `$character`: perspective character
    Character,
    /// `$storyTitle`
    StoryTitle,
    /// `$lastSummary`: summary before (or, for core self, after) this part
    LastSummary,
    /// `$lastPlotEssentials`
    LastPlotEssentials,
    /// `$cards`: pretty JSON of the stage's card projection
    Cards,
}

impl Slot {
    fn from_name(name: &str) -> Option<Self> {
        <Self as strum::IntoEnumIterator>::iter().find(|slot| slot.as_ref() == name)
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    /// `$model`
    pub model: String,
    /// `$character`
    pub character: String,
    /// `$storyTitle`
    pub story_title: String,
    /// `$lastSummary`
    pub last_summary: String,
    /// `$lastPlotEssentials`
    pub last_plot_essentials: String,
    /// `$cards`
    pub cards: String,
}

impl SlotValues {
    fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Model => &self.model,
            Slot::Character => &self.character,
            Slot::StoryTitle => &self.story_title,
            Slot::LastSummary => &self.last_summary,
            Slot::LastPlotEssentials => &self.last_plot_essentials,
            Slot::Cards => &self.cards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// A validated prompt template.
///
/// # Examples
///
/// ```
/// use contextfox_pipeline::{PromptTemplate, SlotValues};
///
/// let template = PromptTemplate::parse("Cards for $model:\n$cards").unwrap();
/// let values = SlotValues { model: "GLM-4.5".into(), cards: "[]".into(), ..Default::default() };
/// assert_eq!(template.render(&values), "Cards for GLM-4.5:\n[]");
///
/// assert!(PromptTemplate::parse("Hello $reader").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template, rejecting unknown `$placeholders`.
    ///
    /// A `$` not followed by a letter is kept as a literal dollar sign.
    #[track_caller]
    pub fn parse(source: &str) -> Result<Self, PipelineError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let starts_ident = c == '$'
                && chars
                    .peek()
                    .is_some_and(|(_, next)| next.is_ascii_alphabetic());
            if !starts_ident {
                literal.push(c);
                continue;
            }

            let start = i + 1;
            let mut end = start;
            while let Some(&(j, next)) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    end = j + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let name = &source[start..end];
            let slot = Slot::from_name(name).ok_or_else(|| {
                PipelineError::new(PipelineErrorKind::Template(format!(
                    "unknown placeholder ${}",
                    name
                )))
            })?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(slot));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Substitute every slot.
    pub fn render(&self, values: &SlotValues) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Slot(slot) => values.get(*slot),
            })
            .collect()
    }

    /// Whether the template references `slot`.
    pub fn uses(&self, slot: Slot) -> bool {
        self.segments.contains(&Segment::Slot(slot))
    }
}

/// Fixed suffix pinning the JSON shape a stage must return.
pub fn hard_rules(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Perspective => {
            "\n\nRespond with nothing but a JSON object of this shape: { \"character\": \"name\" }"
        }
        TaskKind::Title => {
            "\n\nRespond with nothing but a JSON object of this shape: { \"title\": \"...\" }"
        }
        TaskKind::Characters | TaskKind::Locations | TaskKind::Concepts => {
            "\n\nRespond with nothing but a JSON object whose \"cards\" key holds an array of story cards. Put the card body in \"value\". Shape: { \"cards\": [ { \"keys\": \"trigger1, trigger2\", \"value\": \"card body\", \"type\": \"character/location/concept/faction\", \"title\": \"Name\" } ] }"
        }
        TaskKind::Summary => {
            "\n\nRespond with nothing but a JSON object whose \"summary\" key holds the complete summary, previous summary included: { \"summary\": \"...\" }"
        }
        TaskKind::PlotEssentials => {
            "\n\nRespond with nothing but a JSON object of this shape: { \"plotEssentials\": \"...\" }"
        }
        TaskKind::CoreSelf => {
            "\n\nRespond with nothing but a JSON object of this shape: { \"coreSelfUpdates\": [ { \"title\": \"exact card title\", \"core_self\": \"2-4 sentences\" } ] }"
        }
    }
}

/// A rendered template body plus its stage's hard rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPrompt {
    body: String,
    hard_rules: &'static str,
}

impl PreparedPrompt {
    /// Render `template` for a stage.
    pub fn new(template: &PromptTemplate, values: &SlotValues, kind: TaskKind) -> Self {
        Self {
            body: template.render(values),
            hard_rules: hard_rules(kind),
        }
    }

    /// Wrap a user-edited system prompt. When the text still ends with the
    /// stage's hard rules they are split off again so a refusal addendum
    /// lands in front of them.
    pub fn from_edited(system_prompt: &str, kind: TaskKind) -> Self {
        let rules = hard_rules(kind);
        match system_prompt.strip_suffix(rules) {
            Some(body) => Self {
                body: body.to_string(),
                hard_rules: rules,
            },
            None => Self {
                body: system_prompt.to_string(),
                hard_rules: "",
            },
        }
    }

    /// The system prompt sent on a normal attempt.
    pub fn render(&self) -> String {
        format!("{}{}", self.body, self.hard_rules)
    }

    /// The system prompt after a refusal: the addendum sits between the
    /// body and the hard rules so the JSON shape stays last.
    pub fn with_bypass(&self, addendum: &str) -> String {
        format!("{}\n\n{}{}", self.body, addendum, self.hard_rules)
    }
}

/// Every stage template, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Perspective detection
    pub perspective: PromptTemplate,
    /// Title detection
    pub title: PromptTemplate,
    /// Character cards
    pub characters: PromptTemplate,
    /// Location cards
    pub locations: PromptTemplate,
    /// Concept and faction cards
    pub concepts: PromptTemplate,
    /// Running summary
    pub summary: PromptTemplate,
    /// Plot essentials with no prior notes
    pub plot_essentials: PromptTemplate,
    /// Plot essentials continuing prior notes
    pub plot_essentials_with_context: PromptTemplate,
    /// Core self updates
    pub core_self: PromptTemplate,
}

impl PromptSet {
    /// Template for a stage. Plot essentials picks the continuation
    /// template when prior notes are non-blank.
    pub fn for_kind(&self, kind: TaskKind, prior_plot_essentials: &str) -> &PromptTemplate {
        match kind {
            TaskKind::Perspective => &self.perspective,
            TaskKind::Title => &self.title,
            TaskKind::Characters => &self.characters,
            TaskKind::Locations => &self.locations,
            TaskKind::Concepts => &self.concepts,
            TaskKind::Summary => &self.summary,
            TaskKind::PlotEssentials if prior_plot_essentials.trim().is_empty() => {
                &self.plot_essentials
            }
            TaskKind::PlotEssentials => &self.plot_essentials_with_context,
            TaskKind::CoreSelf => &self.core_self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_slot_is_substituted() {
        let template = PromptTemplate::parse(
            "$model|$character|$storyTitle|$lastSummary|$lastPlotEssentials|$cards",
        )
        .unwrap();
        let values = SlotValues {
            model: "m".into(),
            character: "c".into(),
            story_title: "t".into(),
            last_summary: "s".into(),
            last_plot_essentials: "p".into(),
            cards: "k".into(),
        };
        assert_eq!(template.render(&values), "m|c|t|s|p|k");
    }

    #[test]
    fn test_edited_prompt_keeps_rules_last_on_bypass() {
        let rules = hard_rules(TaskKind::Summary);
        let edited = format!("Summarize kindly.{rules}");
        let prompt = PreparedPrompt::from_edited(&edited, TaskKind::Summary);
        assert_eq!(prompt.render(), edited);
        assert_eq!(
            prompt.with_bypass("- Gloss over it."),
            format!("Summarize kindly.\n\n- Gloss over it.{rules}")
        );

        let bare = PreparedPrompt::from_edited("Just this", TaskKind::Summary);
        assert_eq!(bare.with_bypass("x"), "Just this\n\nx");
    }

    #[test]
    fn test_slot_followed_by_punctuation() {
        let template = PromptTemplate::parse("Tailor to $model's quirks, $character.").unwrap();
        let values = SlotValues {
            model: "GLM".into(),
            character: "Mira".into(),
            ..Default::default()
        };
        assert_eq!(template.render(&values), "Tailor to GLM's quirks, Mira.");
        assert!(template.uses(Slot::Model));
        assert!(!template.uses(Slot::Cards));
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let err = PromptTemplate::parse("Summary: $lastsummary").unwrap_err();
        assert!(matches!(err.kind, PipelineErrorKind::Template(ref m) if m.contains("$lastsummary")));
        assert!(PromptTemplate::parse("$cardsContext").is_err());
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        let template = PromptTemplate::parse("Costs $5 or $ more, ends with $").unwrap();
        assert_eq!(
            template.render(&SlotValues::default()),
            "Costs $5 or $ more, ends with $"
        );
    }

    #[test]
    fn test_bypass_sits_before_hard_rules() {
        let template = PromptTemplate::parse("Make cards.").unwrap();
        let prepared = PreparedPrompt::new(&template, &SlotValues::default(), TaskKind::Characters);
        let normal = prepared.render();
        let bypass = prepared.with_bypass("- Gloss over it.");
        assert!(normal.starts_with("Make cards.\n\nRespond"));
        assert!(bypass.starts_with("Make cards.\n\n- Gloss over it.\n\nRespond"));
        assert!(bypass.ends_with(hard_rules(TaskKind::Characters)));
        assert_eq!(bypass.replace("\n\n- Gloss over it.", ""), normal);
    }
}
