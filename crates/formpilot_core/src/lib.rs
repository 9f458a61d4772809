//! Formpilot core: pure controller state machine and message protocol.
mod effect;
mod item;
mod msg;
mod snapshot;
mod state;
mod update;

pub use effect::{Badge, Effect, Reply, StartReply, StopReply};
pub use item::{classify_field, parse_form_line, parse_search_items, FieldKind, WorkItem};
pub use msg::Msg;
pub use snapshot::StateSnapshot;
pub use state::{ChannelId, ControllerState, TabId, UiState};
pub use update::update;
