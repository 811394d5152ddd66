use serde::{Deserialize, Serialize};

/// Lifecycle of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Paused,
    Completed,
}

/// Lifecycle of the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing started since construction or the last reset.
    Idle,
    Running,
    Paused,
    /// Every stage completed; only a reset leaves this state.
    Finished,
}

/// Static definition of one brewing stage, supplied once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StageDefinition {
    pub fn new(id: &str, name: &str, duration_minutes: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            duration_minutes,
            temperature_f: None,
            notes: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature_f: u16) -> Self {
        self.temperature_f = Some(temperature_f);
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 1440;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 60_000; // one logical minute per wall-clock minute
pub const ACTIVITY_LOG_SIZE: usize = 100;
pub const SEQUENCER_OUTPUT_CAPACITY: usize = 8;
