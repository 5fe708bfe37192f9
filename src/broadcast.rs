//! Push-based distribution of monitor output.
//!
//! Consumers subscribe for an unbounded channel of [`Update`]s; the collector
//! and discovery loops publish into every live subscription. Closed
//! receivers are pruned on the next publish.

use crate::catalog::MetricKind;
use crate::process::ProcessInfo;
use crate::store::SamplePoint;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Everything known about one followed process in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidSeries {
    pub pid: u32,
    pub metrics: Vec<MetricSeries>,
}

/// One metric's full retained history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSeries {
    pub kind: MetricKind,
    pub points: Vec<SamplePoint>,
}

/// A message pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The current process listing, sent after each discovery pass.
    Processes(Vec<ProcessInfo>),
    /// Full series snapshot for every followed process, sent after a
    /// collection tick that produced at least one fresh point.
    Series(Vec<PidSeries>),
}

/// Fan-out hub for [`Update`]s.
#[derive(Default)]
pub struct Broadcaster {
    senders: Mutex<Vec<UnboundedSender<Update>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber. The receiver sees only updates published
    /// after this call.
    pub fn subscribe(&self) -> UnboundedReceiver<Update> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().expect("broadcast lock poisoned").push(tx);
        rx
    }

    /// Sends `update` to every live subscriber, dropping closed ones.
    pub fn publish(&self, update: Update) {
        let mut senders = self.senders.lock().expect("broadcast lock poisoned");
        senders.retain(|tx| tx.send(update.clone()).is_ok());
        trace!(subscribers = senders.len(), "published update");
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().expect("broadcast lock poisoned").len()
    }
}
