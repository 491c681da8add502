//! Core self updates for brain cards.

use super::{ExecutionContext, StageInput, TaskCall, execute};
use crate::cards::{brain_cards, cards_json, strip_for_core_self};
use crate::prompts::PreparedPrompt;
use crate::sink::Origin;
use contextfox_core::TaskKind;
use tracing::{debug, instrument, warn};

/// Refresh the core self of every brain card.
///
/// Skipped without a call when the card set has no brain cards. `$cards`
/// holds the brain cards and `$lastSummary` the summary just produced.
#[instrument(skip_all, fields(part = %input.part_indicator))]
pub async fn run_core_self(ctx: &ExecutionContext, input: StageInput<'_>) {
    let kind = TaskKind::CoreSelf;
    let Some(model) = ctx.model_for(kind) else {
        debug!("Core self disabled");
        return;
    };

    let brains = brain_cards(&input.state.accumulated_cards);
    if brains.is_empty() {
        debug!("No brain cards, skipping core self");
        return;
    }

    let mut values = ctx.base_slots(input.state);
    values.cards = cards_json(&strip_for_core_self(&brains));
    let template = ctx.settings().prompts().for_kind(kind, "");

    let call = TaskCall {
        kind,
        part_indicator: input.part_indicator.to_string(),
        model,
        prompt: PreparedPrompt::new(template, &values, kind),
        user_content: input.content.to_string(),
    };
    if let Err(e) = execute(ctx, call, Origin::Pipeline).await {
        warn!(error = %e, "Core self failed, brain cards unchanged");
    }
}
