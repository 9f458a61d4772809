/// Identifies one dispatched job. Every event carries the job that produced
/// it, so a listener can discard reports from a superseded job instead of
/// attributing a stale report to whatever runs now.
pub type JobId = u64;

/// Reports the work loops emit toward the controller. Typed, so the
/// controller classifies outcomes by variant rather than by matching status
/// prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Progress within the item loop; `status` is the operator-facing line.
    Progress {
        status: String,
        items_processed: u32,
        total_items: u32,
    },
    /// The loop reached the end of the queue.
    Finished {
        failed: Vec<String>,
        items_processed: u32,
        total_items: u32,
    },
    /// The loop observed the stop flag and exited between suspension points.
    Stopped {
        items_processed: u32,
        total_items: u32,
    },
    /// Startup failed before the first item was attempted.
    InitFailed { reason: String },
    /// One form record was submitted; a page reload is now in flight and the
    /// loop must be re-entered after navigation.
    AwaitingReload { remaining: u32 },
}

/// Sink for driver events. The loop never learns who is listening.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DriverEvent);
}

/// Forwards events over an mpsc channel, tagged with the job they belong to.
pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<(JobId, DriverEvent)>,
    job: JobId,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<(JobId, DriverEvent)>, job: JobId) -> Self {
        Self { tx, job }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: DriverEvent) {
        let _ = self.tx.send((self.job, event));
    }
}
