//! Read-only progress view handed to whatever renders the run.

use crate::brewing::format::format_minutes;
use crate::brewing::states::Sequencer;
use crate::types::{RunState, StageStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Integer percent of a stage, floored and capped at 100. A stage with no
/// planned time is always complete.
pub fn stage_percent(elapsed_minutes: u32, planned_minutes: u32) -> u8 {
    if planned_minutes == 0 {
        return 100;
    }
    let percent = u64::from(elapsed_minutes) * 100 / u64::from(planned_minutes);
    percent.min(100) as u8
}

/// Completed stages over total stages, rounded half up.
pub fn overall_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}

/// What the main control should offer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    Start,
    Resume,
    Pause,
    StartNewBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: StageStatus,
    pub elapsed_minutes: u32,
    pub planned_minutes: u32,
    pub elapsed_display: String,
    pub planned_display: String,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub run_id: Uuid,
    pub run_state: RunState,
    pub primary_action: PrimaryAction,
    pub started_at: Option<DateTime<Utc>>,
    pub current_index: usize,
    pub current_stage: Option<StageView>,
    pub stages: Vec<StageView>,
    pub completed_stages: usize,
    pub total_stages: usize,
    pub total_elapsed_minutes: u32,
    pub total_elapsed_display: String,
    pub overall_percent: u8,
    pub complete: bool,
}

impl ProgressSnapshot {
    pub fn capture(sequencer: &Sequencer) -> Self {
        let stages: Vec<StageView> = sequencer
            .stages()
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                let elapsed = sequencer.stage_elapsed(index).unwrap_or(0);
                StageView {
                    index,
                    id: definition.id.clone(),
                    name: definition.name.clone(),
                    description: definition.description.clone(),
                    status: sequencer
                        .stage_status(index)
                        .unwrap_or(StageStatus::Pending),
                    elapsed_minutes: elapsed,
                    planned_minutes: definition.duration_minutes,
                    elapsed_display: format_minutes(elapsed),
                    planned_display: format_minutes(definition.duration_minutes),
                    percent: stage_percent(elapsed, definition.duration_minutes),
                    temperature_f: definition.temperature_f,
                    notes: definition.notes.clone(),
                }
            })
            .collect();

        let run_state = sequencer.run_state();
        let total_elapsed = sequencer.total_elapsed();

        Self {
            run_id: sequencer.run_id(),
            run_state,
            primary_action: primary_action(
                run_state,
                sequencer.current_index() > 0 || total_elapsed > 0,
            ),
            started_at: sequencer.started_at(),
            current_index: sequencer.current_index(),
            current_stage: stages.get(sequencer.current_index()).cloned(),
            completed_stages: sequencer.completed_count(),
            total_stages: stages.len(),
            total_elapsed_minutes: total_elapsed,
            total_elapsed_display: format_minutes(total_elapsed),
            overall_percent: sequencer.overall_percent(),
            complete: run_state == RunState::Finished,
            stages,
        }
    }
}

/// Resume is only offered once the run has moved off its first minute.
fn primary_action(run_state: RunState, has_progress: bool) -> PrimaryAction {
    match run_state {
        RunState::Running => PrimaryAction::Pause,
        RunState::Finished => PrimaryAction::StartNewBatch,
        RunState::Idle | RunState::Paused if has_progress => PrimaryAction::Resume,
        RunState::Idle | RunState::Paused => PrimaryAction::Start,
    }
}
