//! Plot essentials.

use super::{ExecutionContext, StageInput, TaskCall, execute};
use crate::cards::{cards_json, separate_cards, strip_for_context};
use crate::prompts::PreparedPrompt;
use crate::sink::Origin;
use contextfox_core::TaskKind;
use tracing::{debug, instrument, warn};

/// Update the plot essentials. Picks the continuation template when prior
/// notes exist. A failure leaves the notes unchanged.
#[instrument(skip_all, fields(part = %input.part_indicator))]
pub async fn run_plot_essentials(ctx: &ExecutionContext, input: StageInput<'_>) {
    let kind = TaskKind::PlotEssentials;
    let Some(model) = ctx.model_for(kind) else {
        debug!("Plot essentials disabled");
        return;
    };

    let regular = separate_cards(&input.state.accumulated_cards, input.exclusions).regular;
    let mut values = ctx.base_slots(input.state);
    values.cards = cards_json(&strip_for_context(&regular));
    let template = ctx
        .settings()
        .prompts()
        .for_kind(kind, &input.state.plot_essentials);

    let call = TaskCall {
        kind,
        part_indicator: input.part_indicator.to_string(),
        model,
        prompt: PreparedPrompt::new(template, &values, kind),
        user_content: input.content.to_string(),
    };
    if let Err(e) = execute(ctx, call, Origin::Pipeline).await {
        warn!(error = %e, "Plot essentials failed, keeping previous notes");
    }
}
