//! Event bus for the process controller
//! Typed publish/subscribe over embassy-sync, reporters never touch the sequencer

use crate::brewing::progress::ProgressSnapshot;
use crate::brewing::states::SequencerOutput;
use anyhow::anyhow;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    pubsub::{PubSubChannel, Subscriber, WaitResult},
};
use serde::Serialize;

const EVENT_CAPACITY: usize = 32;
const MAX_SUBSCRIBERS: usize = 4;
const MAX_PUBLISHERS: usize = 1;

type EventChannel =
    PubSubChannel<CriticalSectionRawMutex, ProcessEvent, EVENT_CAPACITY, MAX_SUBSCRIBERS, MAX_PUBLISHERS>;

/// Everything the controller reports outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    /// Raw transition output from the sequencer
    Event { output: SequencerOutput },
    /// Full progress view, sent after anything changed and on request
    Snapshot { snapshot: ProgressSnapshot },
    /// Input that never reached the sequencer
    Error { message: String },
    ShuttingDown,
}

pub struct EventBus {
    channel: EventChannel,
}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            channel: PubSubChannel::new(),
        }
    }

    /// Publish without waiting; a slow subscriber loses the oldest events
    /// rather than stalling the controller.
    pub fn publish(&self, event: ProcessEvent) {
        self.channel.immediate_publisher().publish_immediate(event);
    }

    pub fn subscriber(&self) -> anyhow::Result<EventSubscriber<'_>> {
        let inner = self
            .channel
            .subscriber()
            .map_err(|e| anyhow!("No event subscriber slot left: {:?}", e))?;
        Ok(EventSubscriber { inner })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber<'a> {
    inner: Subscriber<'a, CriticalSectionRawMutex, ProcessEvent, EVENT_CAPACITY, MAX_SUBSCRIBERS, MAX_PUBLISHERS>,
}

impl<'a> EventSubscriber<'a> {
    /// Wait for the next event, skipping over any lag gap.
    pub async fn next_event(&mut self) -> ProcessEvent {
        loop {
            match self.inner.next_message().await {
                WaitResult::Lagged(count) => {
                    log::warn!("Event subscriber lagged, {} events dropped", count);
                    continue;
                }
                WaitResult::Message(event) => return event,
            }
        }
    }

    pub fn try_next_event(&mut self) -> Option<ProcessEvent> {
        loop {
            match self.inner.try_next_message()? {
                WaitResult::Lagged(_) => continue,
                WaitResult::Message(event) => return Some(event),
            }
        }
    }
}
