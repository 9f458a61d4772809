#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A panel opened and connected a channel; its tab is not yet known.
    PanelConnected { channel: crate::ChannelId },
    /// A panel's channel went away (popup closed).
    PanelDisconnected { channel: crate::ChannelId },
    /// Panel pull: current state for a tab. Linking the supplied channel to
    /// the tab is a side effect of the first request after connect.
    StateRequested {
        tab_id: crate::TabId,
        channel: Option<crate::ChannelId>,
    },
    /// Panel asks to start a job with the given items.
    StartRequested {
        tab_id: crate::TabId,
        items: Vec<crate::WorkItem>,
    },
    /// Panel asks to stop the running job.
    StopRequested { tab_id: crate::TabId },
    /// Runtime report: the driver could not be attached to the page.
    InjectionFailed {
        tab_id: crate::TabId,
        reason: String,
    },
    /// Driver report: progress within the item loop.
    DriverProgress {
        tab_id: crate::TabId,
        status: String,
        items_processed: u32,
        total_items: u32,
    },
    /// Driver report: the item loop ran to the end of the queue.
    DriverFinished {
        tab_id: crate::TabId,
        failed: Vec<String>,
        items_processed: u32,
        total_items: u32,
    },
    /// Driver report: the loop observed the stop flag and exited.
    DriverStopped { tab_id: crate::TabId },
    /// Driver report: startup failed before the first item (e.g. the search
    /// input never appeared).
    DriverInitFailed {
        tab_id: crate::TabId,
        reason: String,
    },
    /// The tab performed a top-level navigation. Destroys any driver.
    TabNavigated { tab_id: crate::TabId },
    /// The tab closed; its state is discarded.
    TabClosed { tab_id: crate::TabId },
    /// Fallback for placeholder wiring.
    NoOp,
}
