use crate::state::UiState;

/// Full point-in-time view of a tab's automation, pushed to the panel on
/// every change. Carries the whole state rather than deltas, so message
/// ordering across rapid-fire updates never matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub is_running: bool,
    pub ui_state: UiState,
    pub status_text: String,
    pub items_processed: u32,
    pub total_items: u32,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            is_running: false,
            ui_state: UiState::Idle,
            status_text: crate::state::IDLE_STATUS.to_string(),
            items_processed: 0,
            total_items: 0,
        }
    }
}
