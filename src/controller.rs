use crate::{
    brewing::{
        progress::ProgressSnapshot,
        stages::StageTable,
        states::{Sequencer, SequencerInput, SequencerOutput},
    },
    protocol::{CommandChannel, ProcessCommand},
    state::StateManager,
    system::{
        config::ProcessConfig,
        events::{EventBus, ProcessEvent},
    },
};
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};
use log::{debug, info};
use std::sync::Arc;

/// Single owner of the sequencer. Commands and wall-clock ticks are handled
/// one at a time on the same loop, so the run state is never shared.
pub struct ProcessController<'a> {
    sequencer: Sequencer,
    state_manager: StateManager,
    events: &'a EventBus,
    command_channel: Arc<CommandChannel>,
    tick_interval: Duration,

    // Only present while the run is running
    ticker: Option<Ticker>,
}

impl<'a> ProcessController<'a> {
    pub fn new(
        config: &ProcessConfig,
        events: &'a EventBus,
        command_channel: Arc<CommandChannel>,
    ) -> anyhow::Result<Self> {
        let stages = config.stage_table()?;
        Ok(Self::with_stages(
            stages,
            Duration::from_millis(config.tick_interval_ms),
            events,
            command_channel,
        ))
    }

    pub fn with_stages(
        stages: StageTable,
        tick_interval: Duration,
        events: &'a EventBus,
        command_channel: Arc<CommandChannel>,
    ) -> Self {
        Self {
            sequencer: Sequencer::new(stages),
            state_manager: StateManager::new(),
            events,
            command_channel,
            tick_interval,
            ticker: None,
        }
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Runs until a shutdown command arrives.
    pub async fn run(&mut self) {
        info!(
            "Process controller running: {} stages, {}ms per minute",
            self.sequencer.stages().len(),
            self.tick_interval.as_millis()
        );
        self.publish_snapshot().await;

        loop {
            let next = match self.ticker.as_mut() {
                Some(ticker) => match select(self.command_channel.receive(), ticker.next()).await {
                    Either::First(command) => Some(command),
                    Either::Second(()) => None,
                },
                None => Some(self.command_channel.receive().await),
            };

            let keep_running = match next {
                Some(command) => self.handle_command(command).await,
                None => {
                    self.handle_tick().await;
                    true
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("Process controller stopped");
    }

    /// Returns false once the controller should stop.
    pub async fn handle_command(&mut self, command: ProcessCommand) -> bool {
        debug!("Handling command: {:?}", command);

        match command {
            ProcessCommand::Start => self.apply(SequencerInput::Start).await,
            ProcessCommand::Pause => self.apply(SequencerInput::Pause).await,
            ProcessCommand::Reset => self.apply(SequencerInput::Reset).await,
            ProcessCommand::Tick => self.handle_tick().await,
            ProcessCommand::Status => self.publish_snapshot().await,
            ProcessCommand::Shutdown => {
                info!("Shutdown requested");
                self.events.publish(ProcessEvent::ShuttingDown);
                return false;
            }
        }

        true
    }

    /// One logical minute, from the ticker or by hand.
    pub async fn handle_tick(&mut self) {
        let was_running = self.sequencer.is_running();
        let changed = self.apply_outputs(SequencerInput::Tick).await;

        // Elapsed minutes moved even when no transition fired
        if was_running && !changed {
            self.publish_snapshot().await;
        }
    }

    async fn apply(&mut self, input: SequencerInput) {
        self.apply_outputs(input).await;
    }

    /// Feeds one input to the sequencer, reacts to its outputs and publishes
    /// a fresh snapshot when anything happened.
    async fn apply_outputs(&mut self, input: SequencerInput) -> bool {
        let outputs = self.sequencer.handle_input(input);
        if outputs.is_empty() {
            if input != SequencerInput::Tick {
                debug!("{:?} had no effect in {:?}", input, self.sequencer.run_state());
            }
            return false;
        }

        for output in outputs {
            match output {
                SequencerOutput::TimerStarted => {
                    debug!("Starting ticker every {}ms", self.tick_interval.as_millis());
                    self.ticker = Some(Ticker::every(self.tick_interval));
                }
                SequencerOutput::TimerStopped => {
                    debug!("Stopping ticker");
                    self.ticker = None;
                }
                _ => {}
            }

            if let Some(line) = self.describe(&output) {
                self.state_manager.add_log(line).await;
            }
            self.events.publish(ProcessEvent::Event { output });
        }

        self.publish_snapshot().await;
        true
    }

    async fn publish_snapshot(&mut self) {
        let snapshot = ProgressSnapshot::capture(&self.sequencer);
        self.state_manager.update_snapshot(snapshot.clone()).await;
        self.events.publish(ProcessEvent::Snapshot { snapshot });
    }

    fn describe(&self, output: &SequencerOutput) -> Option<String> {
        let stage_name = |index: usize| {
            self.sequencer
                .stages()
                .get(index)
                .map(|s| s.name.as_str())
                .unwrap_or("?")
                .to_string()
        };

        match output {
            SequencerOutput::StageStarted { index } => {
                Some(format!("{} started", stage_name(*index)))
            }
            SequencerOutput::StagePaused { index } => Some(format!("{} paused", stage_name(*index))),
            SequencerOutput::StageResumed { index } => {
                Some(format!("{} resumed", stage_name(*index)))
            }
            SequencerOutput::StageCompleted {
                index,
                elapsed_minutes,
            } => Some(format!(
                "{} completed after {} minutes",
                stage_name(*index),
                elapsed_minutes
            )),
            SequencerOutput::RunCompleted {
                total_elapsed_minutes,
            } => Some(format!(
                "Brewing complete in {} minutes",
                total_elapsed_minutes
            )),
            SequencerOutput::RunReset => Some("Run reset".to_string()),
            SequencerOutput::TimerStarted
            | SequencerOutput::TimerStopped
            | SequencerOutput::StateChanged { .. } => None,
        }
    }
}
