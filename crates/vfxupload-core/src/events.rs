//! Pipeline event bus.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel and keeps a bounded
//! buffer of recent events, so a front end that attaches mid-batch can still
//! render the latest state of every job.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::ids::JobId;

/// Maximum number of events retained for late subscribers.
const MAX_RECENT_EVENTS: usize = 200;

/// Pipeline stage a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStage {
    Resolve,
    Tag,
    Upload,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BatchStage::Resolve => "resolve",
            BatchStage::Tag => "tag",
            BatchStage::Upload => "upload",
        })
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    JobAdded {
        job_id: JobId,
        file_name: String,
    },
    JobStatusChanged {
        job_id: JobId,
        /// Status label, e.g. `muxingAudio`.
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    JobRemoved {
        job_id: JobId,
    },
    BatchStarted {
        stage: BatchStage,
        total: usize,
    },
    BatchProgress {
        stage: BatchStage,
        completed: usize,
        total: usize,
    },
    BatchFinished {
        stage: BatchStage,
        total: usize,
    },
}

/// A timestamped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub payload: PipelineEvent,
}

/// Broadcast channel with a bounded buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// `capacity` sizes the broadcast channel; lagging receivers lose the
    /// oldest events beyond it.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, payload: PipelineEvent) {
        let event = Event {
            timestamp: Utc::now(),
            payload,
        };

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.recent.read().iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(512)
    }
}
