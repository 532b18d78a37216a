use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use crate::types::AssetFinding;

/// Receives UI-facing findings from any worker thread.
///
/// `publish` is fire-and-forget: implementations must not wait for the
/// observer to handle the finding.
pub trait FindingSink: Send + Sync {
    fn publish(&self, finding: AssetFinding);
}

impl<T: FindingSink + ?Sized> FindingSink for &T {
    fn publish(&self, finding: AssetFinding) {
        (**self).publish(finding);
    }
}

impl FindingSink for Sender<AssetFinding> {
    fn publish(&self, finding: AssetFinding) {
        let _ = self.send(finding);
    }
}

impl FindingSink for SyncSender<AssetFinding> {
    fn publish(&self, finding: AssetFinding) {
        let _ = self.send(finding);
    }
}

/// Keeps every finding in memory.
#[derive(Debug, Default)]
pub struct FindingCollector {
    findings: Mutex<Vec<AssetFinding>>,
}

impl FindingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<AssetFinding> {
        self.findings.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Vec<AssetFinding> {
        self.findings
            .lock()
            .map(|g| g.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl FindingSink for FindingCollector {
    fn publish(&self, finding: AssetFinding) {
        match self.findings.lock() {
            Ok(mut guard) => guard.push(finding),
            Err(poisoned) => poisoned.into_inner().push(finding),
        }
    }
}

/// Bounded queue drained by one dedicated consumer thread.
///
/// Workers enqueue through [`FindingPump::sink`]; the handler runs only on
/// the consumer thread, which is where observer-thread marshaling happens.
pub struct FindingPump {
    sender: SyncSender<AssetFinding>,
    consumer: JoinHandle<usize>,
}

impl FindingPump {
    pub fn spawn<F>(capacity: usize, mut handler: F) -> Self
    where
        F: FnMut(AssetFinding) + Send + 'static,
    {
        let (sender, receiver): (SyncSender<AssetFinding>, Receiver<AssetFinding>) =
            mpsc::sync_channel(capacity.max(1));
        let consumer = thread::spawn(move || {
            let mut delivered = 0usize;
            for finding in receiver {
                handler(finding);
                delivered += 1;
            }
            delivered
        });
        Self { sender, consumer }
    }

    pub fn sink(&self) -> SyncSender<AssetFinding> {
        self.sender.clone()
    }

    /// Closes the queue, waits for the consumer to drain it and returns how
    /// many findings were handled.
    ///
    /// Every sink handed out must be dropped first or this blocks.
    pub fn finish(self) -> usize {
        let Self { sender, consumer } = self;
        drop(sender);
        consumer.join().unwrap_or(0)
    }
}
