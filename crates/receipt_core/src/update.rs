use crate::{AppState, AttemptKind, ControlError, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FileSelected(upload) => {
            let aborted = state.select_file(upload);
            let mut effects = Vec::with_capacity(2);
            if let Some(attempt) = aborted {
                effects.push(Effect::AbortExtraction { attempt });
            }
            effects.push(Effect::ClearPersisted);
            effects
        }
        Msg::ConfirmClicked => start_attempt(&mut state, AttemptKind::Confirm),
        Msg::RetryClicked => start_attempt(&mut state, AttemptKind::Retry),
        Msg::CancelClicked => {
            let aborted = state.reset();
            let mut effects = Vec::with_capacity(2);
            if let Some(attempt) = aborted {
                effects.push(Effect::AbortExtraction { attempt });
            }
            effects.push(Effect::ClearPersisted);
            effects
        }
        Msg::ResultRestored(response) => {
            if state.restore(response) {
                Vec::new()
            } else {
                vec![Effect::CommandRejected(ControlError::NotIdle)]
            }
        }
        Msg::ProgressTick { attempt, progress } => {
            state.apply_progress(attempt, progress);
            Vec::new()
        }
        Msg::ExtractionFinished { attempt, outcome } => {
            match state.apply_outcome(attempt, outcome) {
                Some(response) => vec![Effect::PersistResult(response)],
                None => Vec::new(),
            }
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_attempt(state: &mut AppState, kind: AttemptKind) -> Vec<Effect> {
    match state.begin_attempt(kind) {
        Ok(start) => {
            let mut effects = Vec::with_capacity(2);
            if let Some(attempt) = start.superseded {
                effects.push(Effect::AbortExtraction { attempt });
            }
            effects.push(Effect::SubmitExtraction {
                attempt: start.attempt,
                upload: start.upload,
            });
            effects
        }
        Err(err) => vec![Effect::CommandRejected(err)],
    }
}
