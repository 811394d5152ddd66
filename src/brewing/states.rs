//! Brewing step sequencer state machine
//! States: Idle, Running, Paused, Finished
//!
//! The machine is purely logical: it knows ticks, not wall-clock time. One
//! tick is one minute of brewing. Whoever owns the [`Sequencer`] decides how
//! often ticks arrive.

use crate::brewing::progress::{overall_percent, stage_percent};
use crate::brewing::stages::StageTable;
use crate::types::{RunState, StageDefinition, StageStatus, SEQUENCER_OUTPUT_CAPACITY};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use statig::prelude::*;
use uuid::Uuid;

// Input events to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerInput {
    Start,
    Pause,
    Reset,
    Tick,
}

// Output events from the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequencerOutput {
    // To the tick source
    TimerStarted,
    TimerStopped,

    // To the display layer
    StageStarted { index: usize },
    StagePaused { index: usize },
    StageResumed { index: usize },
    StageCompleted { index: usize, elapsed_minutes: u32 },
    RunCompleted { total_elapsed_minutes: u32 },
    RunReset,
    StateChanged { from: RunState, to: RunState },
}

pub type SequencerOutputs = heapless::Vec<SequencerOutput, SEQUENCER_OUTPUT_CAPACITY>;

enum TickOutcome {
    Continued,
    Advanced,
    Finished,
}

/// Mutable per-run state. The stage definitions themselves live in the
/// shared [`StageTable`] and are never modified.
#[derive(Debug)]
pub struct RunContext {
    stages: StageTable,
    statuses: Vec<StageStatus>,
    stage_elapsed: Vec<u32>,
    current_index: usize,
    total_elapsed: u32,
    timer_running: bool,
    run_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    outputs: SequencerOutputs, // Collect outputs during state transitions
}

impl RunContext {
    pub fn new(stages: StageTable) -> Self {
        let len = stages.len();
        Self {
            stages,
            statuses: vec![StageStatus::Pending; len],
            stage_elapsed: vec![0; len],
            current_index: 0,
            total_elapsed: 0,
            timer_running: false,
            run_id: Uuid::new_v4(),
            started_at: None,
            outputs: heapless::Vec::new(),
        }
    }

    fn emit(&mut self, output: SequencerOutput) {
        // Capacity covers the longest transition (finishing tick).
        let _ = self.outputs.push(output);
    }

    fn set_current_status(&mut self, status: StageStatus) {
        if let Some(slot) = self.statuses.get_mut(self.current_index) {
            *slot = status;
        }
    }

    fn current_duration(&self) -> u32 {
        self.stages
            .get(self.current_index)
            .map(|stage| stage.duration_minutes)
            .unwrap_or(0)
    }

    fn current_elapsed(&self) -> u32 {
        self.stage_elapsed
            .get(self.current_index)
            .copied()
            .unwrap_or(0)
    }

    fn begin(&mut self) {
        self.current_index = 0;
        self.set_current_status(StageStatus::Active);
        self.timer_running = true;
        self.started_at = Some(Utc::now());
        self.emit(SequencerOutput::TimerStarted);
        self.emit(SequencerOutput::StageStarted { index: 0 });
    }

    fn suspend(&mut self) {
        self.set_current_status(StageStatus::Paused);
        self.timer_running = false;
        self.emit(SequencerOutput::TimerStopped);
        self.emit(SequencerOutput::StagePaused {
            index: self.current_index,
        });
    }

    fn resume(&mut self) {
        self.set_current_status(StageStatus::Active);
        self.timer_running = true;
        self.emit(SequencerOutput::TimerStarted);
        self.emit(SequencerOutput::StageResumed {
            index: self.current_index,
        });
    }

    fn reset(&mut self) {
        if self.timer_running {
            self.emit(SequencerOutput::TimerStopped);
        }
        self.statuses.iter_mut().for_each(|s| *s = StageStatus::Pending);
        self.stage_elapsed.iter_mut().for_each(|e| *e = 0);
        self.current_index = 0;
        self.total_elapsed = 0;
        self.timer_running = false;
        self.run_id = Uuid::new_v4();
        self.started_at = None;
        self.emit(SequencerOutput::RunReset);
    }

    /// One minute passes, then the completion rule is evaluated. The order
    /// matters: a zero-length stage still consumes the tick that completes it.
    fn advance_one_minute(&mut self) -> TickOutcome {
        if let Some(elapsed) = self.stage_elapsed.get_mut(self.current_index) {
            *elapsed = elapsed.saturating_add(1);
        }
        self.total_elapsed = self.total_elapsed.saturating_add(1);

        let elapsed = self.current_elapsed();
        if elapsed < self.current_duration() {
            return TickOutcome::Continued;
        }

        self.set_current_status(StageStatus::Completed);
        self.emit(SequencerOutput::StageCompleted {
            index: self.current_index,
            elapsed_minutes: elapsed,
        });

        if self.current_index + 1 < self.stages.len() {
            self.current_index += 1;
            self.set_current_status(StageStatus::Active);
            self.emit(SequencerOutput::StageStarted {
                index: self.current_index,
            });
            TickOutcome::Advanced
        } else {
            self.timer_running = false;
            self.emit(SequencerOutput::TimerStopped);
            self.emit(SequencerOutput::RunCompleted {
                total_elapsed_minutes: self.total_elapsed,
            });
            TickOutcome::Finished
        }
    }
}

#[derive(Debug, Default)]
pub struct StepSequencer;

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug)),
    on_transition = "Self::on_transition"
)]
impl StepSequencer {
    /// Nothing started yet
    #[state]
    fn idle(context: &mut RunContext, event: &SequencerInput) -> Response<State> {
        use Response::*;

        match event {
            SequencerInput::Start => {
                info!("Starting run {} at stage 0", context.run_id);
                context.begin();
                Transition(State::running())
            }
            SequencerInput::Reset => {
                context.reset();
                Handled
            }
            _ => {
                debug!("{:?} ignored - run not started", event);
                Handled
            }
        }
    }

    /// Timer running, ticks advance the current stage
    #[state]
    fn running(context: &mut RunContext, event: &SequencerInput) -> Response<State> {
        use Response::*;

        match event {
            SequencerInput::Tick => match context.advance_one_minute() {
                TickOutcome::Continued => Handled,
                TickOutcome::Advanced => {
                    info!(
                        "Stage {} active after {} total minutes",
                        context.current_index, context.total_elapsed
                    );
                    Handled
                }
                TickOutcome::Finished => {
                    info!(
                        "All {} stages completed in {} minutes",
                        context.stages.len(),
                        context.total_elapsed
                    );
                    Transition(State::finished())
                }
            },
            SequencerInput::Pause => {
                context.suspend();
                Transition(State::paused())
            }
            SequencerInput::Reset => {
                context.reset();
                Transition(State::idle())
            }
            SequencerInput::Start => {
                debug!("Start ignored - already running");
                Handled
            }
        }
    }

    /// Timer stopped mid-stage, elapsed time retained
    #[state]
    fn paused(context: &mut RunContext, event: &SequencerInput) -> Response<State> {
        use Response::*;

        match event {
            SequencerInput::Start => {
                context.resume();
                Transition(State::running())
            }
            SequencerInput::Reset => {
                context.reset();
                Transition(State::idle())
            }
            _ => {
                debug!("{:?} ignored - run paused", event);
                Handled
            }
        }
    }

    /// Terminal until reset
    #[state]
    fn finished(context: &mut RunContext, event: &SequencerInput) -> Response<State> {
        use Response::*;

        match event {
            SequencerInput::Reset => {
                context.reset();
                Transition(State::idle())
            }
            _ => {
                debug!("{:?} ignored - all stages completed", event);
                Handled
            }
        }
    }
}

impl StepSequencer {
    fn on_transition(&mut self, source: &State, target: &State) {
        let source_state = Self::state_to_run_state(source);
        let target_state = Self::state_to_run_state(target);

        if source_state != target_state {
            info!("Run state transition: {:?} -> {:?}", source_state, target_state);
        }
    }

    fn state_to_run_state(state: &State) -> RunState {
        match state {
            State::Idle {} => RunState::Idle,
            State::Running {} => RunState::Running,
            State::Paused {} => RunState::Paused,
            State::Finished {} => RunState::Finished,
        }
    }
}

/// Owner-facing interface: the machine plus its run context.
pub struct Sequencer {
    machine: StateMachine<StepSequencer>,
    context: RunContext,
}

impl Sequencer {
    pub fn new(stages: StageTable) -> Self {
        Self {
            machine: StepSequencer::default().state_machine(),
            context: RunContext::new(stages),
        }
    }

    /// Process an input event and return output events
    pub fn handle_input(&mut self, input: SequencerInput) -> SequencerOutputs {
        self.context.outputs.clear();

        let previous_state = self.run_state();
        self.machine.handle_with_context(&input, &mut self.context);
        let new_state = self.run_state();

        if previous_state != new_state {
            self.context.emit(SequencerOutput::StateChanged {
                from: previous_state,
                to: new_state,
            });
        }

        std::mem::take(&mut self.context.outputs)
    }

    pub fn start(&mut self) -> SequencerOutputs {
        self.handle_input(SequencerInput::Start)
    }

    pub fn pause(&mut self) -> SequencerOutputs {
        self.handle_input(SequencerInput::Pause)
    }

    pub fn reset(&mut self) -> SequencerOutputs {
        self.handle_input(SequencerInput::Reset)
    }

    pub fn tick(&mut self) -> SequencerOutputs {
        self.handle_input(SequencerInput::Tick)
    }

    pub fn run_state(&self) -> RunState {
        StepSequencer::state_to_run_state(self.machine.state())
    }

    pub fn is_running(&self) -> bool {
        self.context.timer_running
    }

    pub fn stages(&self) -> &StageTable {
        &self.context.stages
    }

    pub fn current_index(&self) -> usize {
        self.context.current_index
    }

    pub fn current_stage(&self) -> Option<&StageDefinition> {
        self.context.stages.get(self.context.current_index)
    }

    pub fn statuses(&self) -> &[StageStatus] {
        &self.context.statuses
    }

    pub fn stage_status(&self, index: usize) -> Option<StageStatus> {
        self.context.statuses.get(index).copied()
    }

    pub fn stage_elapsed(&self, index: usize) -> Option<u32> {
        self.context.stage_elapsed.get(index).copied()
    }

    pub fn current_stage_elapsed(&self) -> u32 {
        self.context.current_elapsed()
    }

    pub fn total_elapsed(&self) -> u32 {
        self.context.total_elapsed
    }

    pub fn completed_count(&self) -> usize {
        self.context
            .statuses
            .iter()
            .filter(|s| **s == StageStatus::Completed)
            .count()
    }

    pub fn current_stage_percent(&self) -> u8 {
        stage_percent(self.context.current_elapsed(), self.context.current_duration())
    }

    /// Completed stages over total stages; stage length plays no part.
    pub fn overall_percent(&self) -> u8 {
        overall_percent(self.completed_count(), self.context.stages.len())
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.context.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stage_table() -> StageTable {
        StageTable::new(vec![
            StageDefinition::new("milling", "Milling", 15),
            StageDefinition::new("mashing", "Mashing", 60),
        ])
        .unwrap()
    }

    fn tick_n(sequencer: &mut Sequencer, n: u32) {
        for _ in 0..n {
            sequencer.tick();
        }
    }

    fn assert_stage_ordering(sequencer: &Sequencer) {
        let current = sequencer.current_index();
        let statuses = sequencer.statuses();

        let active = statuses
            .iter()
            .filter(|s| **s == StageStatus::Active)
            .count();
        assert!(active <= 1, "more than one active stage: {:?}", statuses);

        for (index, status) in statuses.iter().enumerate() {
            if index < current {
                assert_eq!(*status, StageStatus::Completed, "stage {} in {:?}", index, statuses);
            } else if index > current {
                assert_eq!(*status, StageStatus::Pending, "stage {} in {:?}", index, statuses);
            }
        }
    }

    #[test]
    fn test_milling_then_mashing_scenario() {
        let mut sequencer = Sequencer::new(two_stage_table());

        let outputs = sequencer.start();
        assert!(outputs.contains(&SequencerOutput::TimerStarted));
        assert_eq!(sequencer.stage_status(0), Some(StageStatus::Active));

        tick_n(&mut sequencer, 14);
        assert_eq!(sequencer.stage_status(0), Some(StageStatus::Active));
        assert_eq!(sequencer.current_stage_elapsed(), 14);

        let outputs = sequencer.tick();
        assert_eq!(
            outputs.as_slice(),
            &[
                SequencerOutput::StageCompleted {
                    index: 0,
                    elapsed_minutes: 15
                },
                SequencerOutput::StageStarted { index: 1 },
            ]
        );
        assert_eq!(sequencer.stage_status(0), Some(StageStatus::Completed));
        assert_eq!(sequencer.stage_status(1), Some(StageStatus::Active));
        assert_eq!(sequencer.current_index(), 1);
        assert_eq!(sequencer.current_stage_elapsed(), 0);
        assert_eq!(sequencer.total_elapsed(), 15);
        assert!(sequencer.is_running());
        assert_eq!(sequencer.overall_percent(), 50);

        tick_n(&mut sequencer, 60);
        assert_eq!(sequencer.stage_status(1), Some(StageStatus::Completed));
        assert_eq!(sequencer.run_state(), RunState::Finished);
        assert!(!sequencer.is_running());
        assert_eq!(sequencer.total_elapsed(), 75);
        assert_eq!(sequencer.overall_percent(), 100);
        assert_eq!(sequencer.current_index(), 1);
    }

    #[test]
    fn test_ticking_total_duration_completes_every_stage() {
        let tables = vec![
            StageTable::new(vec![
                StageDefinition::new("a", "A", 1),
                StageDefinition::new("b", "B", 7),
                StageDefinition::new("c", "C", 3),
                StageDefinition::new("d", "D", 12),
            ])
            .unwrap(),
            StageTable::new(vec![StageDefinition::new("boil", "Boil", 5)]).unwrap(),
            two_stage_table(),
            StageTable::new(vec![
                StageDefinition::new("mash", "Mash", 4),
                StageDefinition::new("whirlpool", "Whirlpool", 0),
                StageDefinition::new("chill", "Chill", 2),
            ])
            .unwrap(),
        ];

        for table in tables {
            let stage_count = table.len();
            // a zero-length stage still takes one tick to complete
            let ticks: u32 = table.iter().map(|s| s.duration_minutes.max(1)).sum();
            let mut sequencer = Sequencer::new(table);

            sequencer.start();
            for tick in 0..ticks {
                assert!(sequencer.is_running(), "stopped early at tick {}", tick);
                sequencer.tick();
                assert_stage_ordering(&sequencer);
            }

            assert_eq!(sequencer.completed_count(), stage_count);
            assert!(!sequencer.is_running());
            assert_eq!(sequencer.run_state(), RunState::Finished);
            assert_eq!(sequencer.total_elapsed(), ticks);
        }
    }

    #[test]
    fn test_finishing_tick_stops_timer() {
        let table = StageTable::new(vec![StageDefinition::new("boil", "Boil", 2)]).unwrap();
        let mut sequencer = Sequencer::new(table);
        sequencer.start();
        sequencer.tick();

        let outputs = sequencer.tick();
        assert_eq!(
            outputs.as_slice(),
            &[
                SequencerOutput::StageCompleted {
                    index: 0,
                    elapsed_minutes: 2
                },
                SequencerOutput::TimerStopped,
                SequencerOutput::RunCompleted {
                    total_elapsed_minutes: 2
                },
                SequencerOutput::StateChanged {
                    from: RunState::Running,
                    to: RunState::Finished
                },
            ]
        );
    }

    #[test]
    fn test_reset_from_any_state() {
        let table = StageTable::brewing_default();

        // idle
        let mut sequencer = Sequencer::new(table.clone());
        sequencer.reset();
        assert_reset(&sequencer);

        // running, mid second stage
        let mut sequencer = Sequencer::new(table.clone());
        sequencer.start();
        tick_n(&mut sequencer, 20);
        let outputs = sequencer.reset();
        assert!(outputs.contains(&SequencerOutput::TimerStopped));
        assert!(outputs.contains(&SequencerOutput::RunReset));
        assert_reset(&sequencer);

        // paused
        let mut sequencer = Sequencer::new(table.clone());
        sequencer.start();
        tick_n(&mut sequencer, 3);
        sequencer.pause();
        let outputs = sequencer.reset();
        assert!(!outputs.contains(&SequencerOutput::TimerStopped));
        assert_reset(&sequencer);

        // finished
        let short = StageTable::new(vec![StageDefinition::new("x", "X", 1)]).unwrap();
        let mut sequencer = Sequencer::new(short);
        sequencer.start();
        sequencer.tick();
        assert_eq!(sequencer.run_state(), RunState::Finished);
        sequencer.reset();
        assert_reset(&sequencer);
    }

    fn assert_reset(sequencer: &Sequencer) {
        assert_eq!(sequencer.run_state(), RunState::Idle);
        assert_eq!(sequencer.current_index(), 0);
        assert_eq!(sequencer.current_stage_elapsed(), 0);
        assert_eq!(sequencer.total_elapsed(), 0);
        assert!(!sequencer.is_running());
        assert!(sequencer.started_at().is_none());
        assert!(sequencer
            .statuses()
            .iter()
            .all(|s| *s == StageStatus::Pending));
        assert!((0..sequencer.stages().len()).all(|i| sequencer.stage_elapsed(i) == Some(0)));
    }

    #[test]
    fn test_reset_issues_new_run_id() {
        let mut sequencer = Sequencer::new(two_stage_table());
        let first = sequencer.run_id();
        sequencer.start();
        sequencer.reset();
        assert_ne!(sequencer.run_id(), first);
    }

    #[test]
    fn test_pause_resume_keeps_elapsed_minutes() {
        let mut uninterrupted = Sequencer::new(two_stage_table());
        uninterrupted.start();
        tick_n(&mut uninterrupted, 25);

        let mut interrupted = Sequencer::new(two_stage_table());
        interrupted.start();
        tick_n(&mut interrupted, 10);

        let outputs = interrupted.pause();
        assert!(outputs.contains(&SequencerOutput::TimerStopped));
        assert_eq!(interrupted.stage_status(0), Some(StageStatus::Paused));
        assert_eq!(interrupted.current_stage_elapsed(), 10);
        assert_stage_ordering(&interrupted);

        // ticks while paused are dropped
        tick_n(&mut interrupted, 5);
        assert_eq!(interrupted.total_elapsed(), 10);

        let outputs = interrupted.start();
        assert!(outputs.contains(&SequencerOutput::StageResumed { index: 0 }));
        assert_eq!(interrupted.stage_status(0), Some(StageStatus::Active));
        tick_n(&mut interrupted, 15);

        assert_eq!(interrupted.current_index(), uninterrupted.current_index());
        assert_eq!(
            interrupted.current_stage_elapsed(),
            uninterrupted.current_stage_elapsed()
        );
        assert_eq!(interrupted.total_elapsed(), uninterrupted.total_elapsed());
        assert_eq!(interrupted.statuses(), uninterrupted.statuses());
    }

    #[test]
    fn test_out_of_contract_calls_are_silent() {
        let mut sequencer = Sequencer::new(two_stage_table());

        assert!(sequencer.pause().is_empty());
        assert!(sequencer.tick().is_empty());
        assert_eq!(sequencer.total_elapsed(), 0);
        assert_eq!(sequencer.run_state(), RunState::Idle);

        sequencer.start();
        assert!(sequencer.start().is_empty());

        sequencer.pause();
        assert!(sequencer.pause().is_empty());

        sequencer.start();
        tick_n(&mut sequencer, 75);
        assert_eq!(sequencer.run_state(), RunState::Finished);
        assert!(sequencer.start().is_empty());
        assert!(sequencer.pause().is_empty());
        assert!(sequencer.tick().is_empty());
        assert_eq!(sequencer.total_elapsed(), 75);
        assert_eq!(sequencer.run_state(), RunState::Finished);
    }

    #[test]
    fn test_zero_length_stage_completes_on_next_tick() {
        let table = StageTable::new(vec![
            StageDefinition::new("sanitize", "Sanitize", 1),
            StageDefinition::new("pitch", "Pitch", 0),
            StageDefinition::new("ferment", "Ferment", 2),
        ])
        .unwrap();
        let mut sequencer = Sequencer::new(table);
        sequencer.start();

        sequencer.tick();
        assert_eq!(sequencer.current_index(), 1);
        assert_eq!(sequencer.stage_status(1), Some(StageStatus::Active));
        assert_eq!(sequencer.current_stage_percent(), 100);

        let outputs = sequencer.tick();
        assert!(outputs.contains(&SequencerOutput::StageCompleted {
            index: 1,
            elapsed_minutes: 1
        }));
        assert_eq!(sequencer.current_index(), 2);
        assert_eq!(sequencer.total_elapsed(), 2);
    }

    #[test]
    fn test_overall_percent_ignores_stage_length() {
        let table = StageTable::new(vec![
            StageDefinition::new("quick", "Quick", 1),
            StageDefinition::new("long", "Long", 20_160),
        ])
        .unwrap();
        let mut sequencer = Sequencer::new(table);
        sequencer.start();
        sequencer.tick();

        assert_eq!(sequencer.completed_count(), 1);
        assert_eq!(sequencer.overall_percent(), 50);
    }

    #[test]
    fn test_state_changes_reported() {
        let mut sequencer = Sequencer::new(two_stage_table());

        let outputs = sequencer.start();
        assert_eq!(
            outputs.last(),
            Some(&SequencerOutput::StateChanged {
                from: RunState::Idle,
                to: RunState::Running
            })
        );

        let outputs = sequencer.pause();
        assert_eq!(
            outputs.last(),
            Some(&SequencerOutput::StateChanged {
                from: RunState::Running,
                to: RunState::Paused
            })
        );
        assert_eq!(sequencer.run_state(), RunState::Paused);
    }
}
