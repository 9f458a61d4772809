//! Panel component: the operator-facing view of one tab's automation.
//!
//! A panel is a thin client of the controller. It connects under a unique
//! channel id, asks for the current snapshot when it opens (which links the
//! channel to its tab), and from then on renders whatever snapshots the
//! controller pushes. Closing the panel never affects a running job.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;

use formpilot_core::{
    parse_form_line, parse_search_items, StartReply, StateSnapshot, StopReply, TabId, UiState,
    WorkItem,
};
use pilot_logging::pilot_info;

use crate::persistence;
use crate::runtime::{ControllerHandle, JobMode, StatusUpdate};

static NEXT_CHANNEL: AtomicU32 = AtomicU32::new(1);

/// What the panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub status_line: String,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub failed_items: Vec<String>,
    /// Restorable input from a previous session, when a fresh draft exists.
    pub draft: Option<String>,
}

pub struct Panel {
    controller: ControllerHandle,
    channel: String,
    tab_id: TabId,
    mode: JobMode,
    draft_path: PathBuf,
    updates: mpsc::Receiver<StatusUpdate>,
    view: PanelView,
}

impl Panel {
    /// Opens a panel against a tab: connect, fetch the snapshot, restore any
    /// fresh draft. A controller that cannot be reached renders as an error
    /// status line with the controls still usable.
    pub fn open(
        controller: ControllerHandle,
        tab_id: TabId,
        mode: JobMode,
        draft_path: PathBuf,
    ) -> Self {
        let channel = format!(
            "panel-{tab_id}-{}",
            NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed)
        );
        let updates = controller.connect_panel(&channel);
        let mut panel = Self {
            controller,
            channel,
            tab_id,
            mode,
            draft_path,
            updates,
            view: PanelView {
                status_line: String::new(),
                start_enabled: true,
                stop_enabled: false,
                failed_items: Vec::new(),
                draft: None,
            },
        };
        match panel.controller.request_state(tab_id, Some(&panel.channel)) {
            Ok(snapshot) => panel.apply_snapshot(&snapshot),
            Err(err) => panel.view.status_line = format!("Error: {err}"),
        }
        panel.view.draft = persistence::load_draft(&panel.draft_path);
        panel
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Applies any updates the controller pushed since the last call.
    /// Returns true if the view changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(update) = self.updates.try_recv() {
            match update {
                StatusUpdate::Snapshot { tab_id, snapshot } if tab_id == self.tab_id => {
                    self.apply_snapshot(&snapshot);
                    changed = true;
                }
                StatusUpdate::FailedItems { tab_id, items } if tab_id == self.tab_id => {
                    self.view.failed_items = items;
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }

    /// Remembers the operator's input so a closed panel can offer it back.
    pub fn input_changed(&self, text: &str) {
        persistence::save_draft(&self.draft_path, text);
    }

    /// Parses the pasted input and asks the controller to start. Parse
    /// rejections and controller rejections both land in the status line;
    /// the controls stay usable either way.
    pub fn start(&mut self, text: &str) {
        let items = match parse_items(self.mode, text) {
            Ok(items) => items,
            Err(reason) => {
                self.view.status_line = format!("Error: {reason}");
                return;
            }
        };
        if items.is_empty() {
            self.view.status_line = "Error: no work items in the input".to_string();
            return;
        }

        match self.controller.start_job(self.tab_id, items) {
            Ok(StartReply::Acknowledged) => {
                // The accepted-start snapshot arrives as a push; just drop
                // the draft, the list is now the controller's.
                persistence::clear_draft(&self.draft_path);
                self.view.draft = None;
            }
            Ok(StartReply::AlreadyActive) => {
                self.view.status_line =
                    "A job is already running in this tab.".to_string();
            }
            Ok(StartReply::Error(reason)) => {
                self.view.status_line = format!("Error: {reason}");
            }
            Err(err) => {
                self.view.status_line = format!("Error: {err}");
            }
        }
    }

    /// Requests a stop. The view resets optimistically so the operator is
    /// never stuck looking at a running state the controller cannot confirm.
    pub fn stop(&mut self) {
        self.view.start_enabled = true;
        self.view.stop_enabled = false;
        self.view.status_line = "Automation stopped.".to_string();

        match self.controller.stop_job(self.tab_id) {
            Ok(StopReply::Stopped) => {}
            Ok(StopReply::NotActive) => {
                self.view.status_line = "Automation was not active in this tab.".to_string();
            }
            Err(err) => {
                pilot_info!("Stop request could not be confirmed: {err}");
            }
        }
    }

    /// Disconnects the channel. The job, if any, keeps running.
    pub fn close(self) {
        self.controller.disconnect_panel(&self.channel);
    }

    fn apply_snapshot(&mut self, snapshot: &StateSnapshot) {
        self.view.status_line = format_status_line(snapshot);
        self.view.start_enabled = !snapshot.is_running;
        self.view.stop_enabled = snapshot.is_running;
    }
}

/// The status line the operator sees: the controller's text, with a
/// progress suffix while a job is underway.
fn format_status_line(snapshot: &StateSnapshot) -> String {
    match snapshot.ui_state {
        UiState::Starting | UiState::Running | UiState::Stopping if snapshot.total_items > 0 => {
            format!(
                "{} ({}/{})",
                snapshot.status_text, snapshot.items_processed, snapshot.total_items
            )
        }
        _ => snapshot.status_text.clone(),
    }
}

/// Parses the pasted input for the panel's mode. Form lines are validated
/// here so the operator learns about a bad line before anything starts.
fn parse_items(mode: JobMode, text: &str) -> Result<Vec<WorkItem>, String> {
    match mode {
        JobMode::Search => Ok(parse_search_items(text)),
        JobMode::Form => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_form_line)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core::FieldKind;

    #[test]
    fn status_line_carries_progress_while_running() {
        let snapshot = StateSnapshot {
            is_running: true,
            ui_state: UiState::Running,
            status_text: "Processing item CKT-7".to_string(),
            items_processed: 2,
            total_items: 5,
        };
        assert_eq!(format_status_line(&snapshot), "Processing item CKT-7 (2/5)");
    }

    #[test]
    fn status_line_is_bare_when_idle() {
        let snapshot = StateSnapshot {
            total_items: 5,
            ..StateSnapshot::default()
        };
        assert_eq!(format_status_line(&snapshot), "Idle");
    }

    #[test]
    fn search_input_splits_into_terms() {
        let items = parse_items(JobMode::Search, " CKT-1 \n\nCKT-2\n").unwrap();
        assert_eq!(
            items,
            vec![
                WorkItem::Search("CKT-1".to_string()),
                WorkItem::Search("CKT-2".to_string()),
            ]
        );
    }

    #[test]
    fn form_input_is_validated_per_line() {
        let items = parse_items(JobMode::Form, "SC-123456,High\n654321,Low").unwrap();
        assert_eq!(
            items[0],
            WorkItem::FormEntry {
                value: "SC-123456".to_string(),
                field: FieldKind::ServiceComponent,
                expected_impact: "High".to_string(),
            }
        );
        assert_eq!(items.len(), 2);

        let err = parse_items(JobMode::Form, "SC-123456,High\nnonsense").unwrap_err();
        assert!(err.contains("nonsense"), "unexpected reason: {err}");
    }
}
