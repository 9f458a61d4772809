use crate::{ChannelId, StateSnapshot, TabId, WorkItem};

/// Side effects requested by the controller transition function. The runtime
/// executes them in order; the pure core never performs IO itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Response to the request that produced this transition.
    Reply(Reply),
    /// Attach a driver to the tab and hand it the item list.
    InjectDriver { tab_id: TabId, items: Vec<WorkItem> },
    /// Raise the driver's cooperative stop flag.
    SignalStop { tab_id: TabId },
    /// Push a full snapshot to an attached panel channel. A detached panel
    /// simply misses the update; there is no buffering or replay.
    PushStatus {
        channel: ChannelId,
        tab_id: TabId,
        snapshot: StateSnapshot,
    },
    /// Update the per-tab toolbar badge.
    SetBadge { tab_id: TabId, badge: Badge },
    /// Surface the failed-items list in its dedicated view.
    ShowFailedItems { tab_id: TabId },
}

/// Reply to a panel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    State(StateSnapshot),
    Start(StartReply),
    Stop(StopReply),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartReply {
    Acknowledged,
    /// A job is already running in this tab; the request is rejected, not
    /// queued.
    AlreadyActive,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReply {
    Stopped,
    NotActive,
}

/// Per-tab toolbar badge values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Running,
    Error,
    Stopped,
    Done,
    Failed,
    Navigated,
    Clear,
}
