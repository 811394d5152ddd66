use crate::brewing::progress::ProgressSnapshot;
use crate::types::{RunState, ACTIVITY_LOG_SIZE};
use chrono::Utc;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use log::info;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub snapshot: Option<ProgressSnapshot>,
    pub activity: heapless::Vec<String, ACTIVITY_LOG_SIZE>,
}

/// Latest progress view and a bounded activity log, shared with readers.
pub struct StateManager {
    state: Arc<Mutex<CriticalSectionRawMutex, DashboardState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DashboardState::default())),
        }
    }

    pub async fn update_snapshot(&self, snapshot: ProgressSnapshot) {
        let mut state = self.state.lock().await;
        let previous = state.snapshot.as_ref().map(|s| s.run_state);
        if previous != Some(snapshot.run_state) {
            info!(
                "Run {} now {:?} ({}% complete)",
                snapshot.run_id, snapshot.run_state, snapshot.overall_percent
            );
            let entry = format!("Run: {:?}", snapshot.run_state);
            Self::push_activity(&mut state, entry);
        }
        state.snapshot = Some(snapshot);
    }

    pub async fn add_log(&self, message: String) {
        let mut state = self.state.lock().await;
        Self::push_activity(&mut state, message);
    }

    fn push_activity(state: &mut DashboardState, message: String) {
        let entry = format!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), message);

        if state.activity.len() >= ACTIVITY_LOG_SIZE {
            state.activity.remove(0);
        }

        let _ = state.activity.push(entry);
    }

    pub async fn get_snapshot(&self) -> Option<ProgressSnapshot> {
        let state = self.state.lock().await;
        state.snapshot.clone()
    }

    pub async fn get_run_state(&self) -> RunState {
        let state = self.state.lock().await;
        state
            .snapshot
            .as_ref()
            .map(|s| s.run_state)
            .unwrap_or(RunState::Idle)
    }

    pub async fn get_activity(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.activity.iter().cloned().collect()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
