//! Character, location, concept and summary generation.

use super::{ExecutionContext, StageInput, TaskCall, execute};
use crate::cards::{cards_json, separate_cards, strip_for_card_generation, strip_for_context};
use crate::prompts::PreparedPrompt;
use crate::sink::Origin;
use contextfox_core::TaskKind;
use contextfox_error::PipelineError;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

const CARD_STAGES: [TaskKind; 3] = [
    TaskKind::Characters,
    TaskKind::Locations,
    TaskKind::Concepts,
];

/// Run every enabled card stage and the summary concurrently.
///
/// Card failures are logged and tolerated. A summary failure is returned
/// so the processor can abort the run.
#[instrument(skip_all, fields(part = %input.part_indicator))]
pub async fn run_cards_and_summary(
    ctx: &ExecutionContext,
    input: StageInput<'_>,
) -> Result<(), PipelineError> {
    let regular = separate_cards(&input.state.accumulated_cards, input.exclusions).regular;
    let base = ctx.base_slots(input.state);

    let mut card_values = base.clone();
    card_values.cards = cards_json(&strip_for_card_generation(&regular));
    let mut summary_values = base;
    summary_values.cards = cards_json(&strip_for_context(&regular));

    let call = |kind: TaskKind| {
        let Some(model) = ctx.model_for(kind) else {
            debug!(task = %kind.id_prefix(), "Stage disabled");
            return None;
        };
        let values = if kind == TaskKind::Summary {
            &summary_values
        } else {
            &card_values
        };
        let template = ctx.settings().prompts().for_kind(kind, "");
        Some(TaskCall {
            kind,
            part_indicator: input.part_indicator.to_string(),
            model,
            prompt: PreparedPrompt::new(template, values, kind),
            user_content: input.content.to_string(),
        })
    };

    let card_calls: Vec<TaskCall> = CARD_STAGES.into_iter().filter_map(&call).collect();
    let summary_call = call(TaskKind::Summary);

    let (card_results, summary_result) = futures::join!(
        join_all(
            card_calls
                .into_iter()
                .map(|call| execute(ctx, call, Origin::Pipeline))
        ),
        async {
            match summary_call {
                Some(call) => execute(ctx, call, Origin::Pipeline).await,
                None => Ok(()),
            }
        },
    );

    for result in card_results {
        if let Err(e) = result {
            warn!(error = %e, "Card generation failed, continuing with the other stages");
        }
    }
    summary_result
}
