//! Formpilot driver: page-side work loops and effect execution.
mod cancel;
mod driver;
mod events;
mod form;
mod page;
mod search;
mod settings;
mod store;

pub use cancel::CancelToken;
pub use driver::DriverHandle;
pub use events::{ChannelEventSink, DriverEvent, EventSink, JobId};
pub use form::run_form_step;
pub use page::{EntryFormPage, Key, PageError, SearchPage};
pub use search::{matches_expected_result, normalize_search_key, run_search_job};
pub use settings::DriverSettings;
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError, StoredState};
