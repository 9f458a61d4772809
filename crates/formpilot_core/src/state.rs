use std::collections::{BTreeMap, BTreeSet};

use crate::snapshot::StateSnapshot;

/// Identifier of a target page instance.
pub type TabId = u32;

/// Identifier of a panel's communication channel (the port name it connected
/// under). The controller holds it as a handle only; it never owns the panel.
pub type ChannelId = String;

/// Operator-visible phase of a tab's automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    CompletedSuccess,
    CompletedErrors,
    ErroredInit,
}

pub(crate) const IDLE_STATUS: &str = "Idle";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TabState {
    pub is_running: bool,
    pub ui_state: UiState,
    pub last_status: String,
    pub items_processed: u32,
    pub total_items: u32,
    pub panel_channel: Option<ChannelId>,
}

impl Default for TabState {
    fn default() -> Self {
        Self {
            is_running: false,
            ui_state: UiState::Idle,
            last_status: IDLE_STATUS.to_string(),
            items_processed: 0,
            total_items: 0,
            panel_channel: None,
        }
    }
}

impl TabState {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            is_running: self.is_running,
            ui_state: self.ui_state,
            status_text: self.last_status.clone(),
            items_processed: self.items_processed,
            total_items: self.total_items,
        }
    }
}

/// Controller-owned state: one entry per tab plus the registry of panel
/// channels that have connected but are not yet linked to a tab.
///
/// Entries are created on first use and deleted when the tab closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerState {
    tabs: BTreeMap<TabId, TabState>,
    pending_channels: BTreeSet<ChannelId>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for a tab; a default idle snapshot if no state exists yet.
    pub fn snapshot(&self, tab_id: TabId) -> StateSnapshot {
        self.tabs
            .get(&tab_id)
            .map(TabState::snapshot)
            .unwrap_or_default()
    }

    /// The panel channel currently linked to a tab, if any.
    pub fn panel_channel(&self, tab_id: TabId) -> Option<&ChannelId> {
        self.tabs.get(&tab_id).and_then(|t| t.panel_channel.as_ref())
    }

    pub(crate) fn tab(&self, tab_id: TabId) -> Option<&TabState> {
        self.tabs.get(&tab_id)
    }

    pub(crate) fn tab_mut(&mut self, tab_id: TabId) -> &mut TabState {
        self.tabs.entry(tab_id).or_default()
    }

    pub(crate) fn remove_tab(&mut self, tab_id: TabId) -> bool {
        self.tabs.remove(&tab_id).is_some()
    }

    pub(crate) fn register_pending_channel(&mut self, channel: ChannelId) {
        self.pending_channels.insert(channel);
    }

    /// Links a pending channel to a tab. Returns true if the channel was
    /// pending (first request after connect); re-linking an already linked
    /// channel is a no-op either way.
    pub(crate) fn link_channel(&mut self, tab_id: TabId, channel: &ChannelId) -> bool {
        let was_pending = self.pending_channels.remove(channel);
        let tab = self.tab_mut(tab_id);
        if tab.panel_channel.as_ref() != Some(channel) {
            tab.panel_channel = Some(channel.clone());
        }
        was_pending
    }

    /// Drops a channel from the pending registry and from every tab that
    /// holds it. Tab state itself is untouched; a panel disconnect never
    /// affects a job.
    pub(crate) fn drop_channel(&mut self, channel: &ChannelId) {
        self.pending_channels.remove(channel);
        for tab in self.tabs.values_mut() {
            if tab.panel_channel.as_deref() == Some(channel.as_str()) {
                tab.panel_channel = None;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_channel(&self, channel: &str) -> bool {
        self.pending_channels.contains(channel)
    }
}
