use formpilot_core::FieldKind;
use thiserror::Error;

/// A single key press dispatched to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("page not accessible: {0}")]
    Inaccessible(String),
}

/// Seam to the page that hosts the typed-search workflow. Implementations
/// perform single DOM-level actions; all timing, retrying, and cancellation
/// belongs to the driver loop.
#[async_trait::async_trait]
pub trait SearchPage: Send + Sync {
    /// One attempt to locate the search input (possibly inside a nested
    /// frame). The loop retries with a bounded budget and fixed backoff.
    async fn locate_search_input(&self) -> bool;

    /// Replace the input contents wholesale and dispatch input/change
    /// notifications.
    async fn set_input_value(&self, text: &str) -> Result<(), PageError>;

    /// Dispatch one key event pair (down/up) to the input.
    async fn send_key(&self, key: Key) -> Result<(), PageError>;

    /// One poll: has the loading indicator disappeared?
    async fn loading_indicator_cleared(&self) -> bool;

    /// One poll: the result rows currently visible in the dropdown.
    async fn visible_results(&self) -> Vec<String>;

    /// Clear and re-focus the input between items.
    async fn clear_input(&self) -> Result<(), PageError>;
}

/// Seam to the page that hosts the entry-form workflow. One record per page
/// lifetime; submitting navigates and destroys the driver instance.
#[async_trait::async_trait]
pub trait EntryFormPage: Send + Sync {
    /// Fill the field matching `field` and dispatch change notifications.
    async fn fill_field(&self, field: FieldKind, value: &str) -> Result<(), PageError>;

    /// Select the option with the given label in the expected-impact
    /// dropdown. `Ok(false)` means the dropdown exists but the label does
    /// not.
    async fn select_expected_impact(&self, label: &str) -> Result<bool, PageError>;

    /// Click save-and-new. Triggers a native form submission and with it a
    /// full page reload.
    async fn submit_save_and_new(&self) -> Result<(), PageError>;
}
