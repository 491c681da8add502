//! Perspective and title detection.

use super::{ExecutionContext, StageInput, TaskCall, execute};
use crate::cards::{cards_json, separate_cards, strip_for_context};
use crate::prompts::PreparedPrompt;
use crate::sink::Origin;
use contextfox_core::TaskKind;
use tracing::{debug, instrument, warn};

/// Wrapped around the story so identity models analyse it instead of
/// continuing it.
pub const IDENTITY_PREAMBLE: &str = "[Story content for context - do not continue this story, follow the instructions in the system prompt instead]\n\n";

/// Run perspective and title detection concurrently.
///
/// Disabled stages are skipped. Failures are logged and leave the known
/// character and title untouched.
#[instrument(skip_all, fields(part = %input.part_indicator))]
pub async fn detect_identity(ctx: &ExecutionContext, input: StageInput<'_>) {
    let regular = separate_cards(&input.state.accumulated_cards, input.exclusions).regular;
    let mut values = ctx.base_slots(input.state);
    values.cards = cards_json(&strip_for_context(&regular));
    let user_content = format!("{}{}", IDENTITY_PREAMBLE, input.content);

    let call = |kind: TaskKind| {
        let Some(model) = ctx.model_for(kind) else {
            debug!(task = %kind.id_prefix(), "Stage disabled");
            return None;
        };
        let template = ctx.settings().prompts().for_kind(kind, "");
        Some(TaskCall {
            kind,
            part_indicator: input.part_indicator.to_string(),
            model,
            prompt: PreparedPrompt::new(template, &values, kind),
            user_content: user_content.clone(),
        })
    };

    let perspective = call(TaskKind::Perspective);
    let title = call(TaskKind::Title);

    let (perspective, title) = futures::join!(
        async {
            match perspective {
                Some(call) => execute(ctx, call, Origin::Pipeline).await,
                None => Ok(()),
            }
        },
        async {
            match title {
                Some(call) => execute(ctx, call, Origin::Pipeline).await,
                None => Ok(()),
            }
        },
    );

    for result in [perspective, title] {
        if let Err(e) = result {
            warn!(error = %e, "Identity detection failed, keeping previous value");
        }
    }
}
