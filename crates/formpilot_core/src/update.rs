use crate::state::IDLE_STATUS;
use crate::{
    Badge, ControllerState, Effect, Msg, Reply, StartReply, StopReply, TabId, UiState,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Every transition that changes what the operator should see emits a
/// `PushStatus` effect when a panel channel is linked to the tab. Replies to
/// panel requests are emitted as `Effect::Reply` and routed back by the
/// runtime.
pub fn update(mut state: ControllerState, msg: Msg) -> (ControllerState, Vec<Effect>) {
    let effects = match msg {
        Msg::PanelConnected { channel } => {
            state.register_pending_channel(channel);
            Vec::new()
        }
        Msg::PanelDisconnected { channel } => {
            state.drop_channel(&channel);
            Vec::new()
        }
        Msg::StateRequested { tab_id, channel } => {
            if let Some(channel) = channel {
                state.link_channel(tab_id, &channel);
            }
            // A stop whose driver ack never arrived (worker gone) must not
            // show as stopping forever; fold it to idle on the next poll.
            // `is_running` is already false, so a restart was never blocked.
            if state
                .tab(tab_id)
                .is_some_and(|t| !t.is_running && t.ui_state == UiState::Stopping)
            {
                let tab = state.tab_mut(tab_id);
                tab.ui_state = UiState::Idle;
                tab.last_status = "Automation stopped.".to_string();
            }
            vec![Effect::Reply(Reply::State(state.snapshot(tab_id)))]
        }
        Msg::StartRequested { tab_id, items } => {
            if state.tab(tab_id).is_some_and(|t| t.is_running) {
                // No queuing, no preemption. Re-send the live snapshot so a
                // reconnected panel catches up on what is actually running.
                let mut effects = vec![Effect::Reply(Reply::Start(StartReply::AlreadyActive))];
                effects.extend(push_status(&state, tab_id));
                return (state, effects);
            }
            if items.is_empty() {
                return (
                    state,
                    vec![Effect::Reply(Reply::Start(StartReply::Error(
                        "no work items supplied".to_string(),
                    )))],
                );
            }
            let total = items.len() as u32;
            let tab = state.tab_mut(tab_id);
            tab.is_running = true;
            tab.ui_state = UiState::Starting;
            tab.last_status = "Starting automation in this tab...".to_string();
            tab.items_processed = 0;
            tab.total_items = total;

            let mut effects = vec![
                Effect::Reply(Reply::Start(StartReply::Acknowledged)),
                Effect::SetBadge {
                    tab_id,
                    badge: Badge::Running,
                },
            ];
            effects.extend(push_status(&state, tab_id));
            effects.push(Effect::InjectDriver { tab_id, items });
            effects
        }
        Msg::StopRequested { tab_id } => {
            if state.tab(tab_id).is_some_and(|t| t.is_running) {
                let tab = state.tab_mut(tab_id);
                tab.is_running = false;
                tab.ui_state = UiState::Stopping;
                tab.last_status = "Automation stopping...".to_string();
                let mut effects = vec![
                    Effect::Reply(Reply::Stop(StopReply::Stopped)),
                    Effect::SignalStop { tab_id },
                ];
                effects.extend(push_status(&state, tab_id));
                effects
            } else {
                let tab = state.tab_mut(tab_id);
                tab.ui_state = UiState::Idle;
                tab.last_status = "Automation was not active in this tab.".to_string();
                let mut effects = vec![
                    Effect::Reply(Reply::Stop(StopReply::NotActive)),
                    Effect::SetBadge {
                        tab_id,
                        badge: Badge::Clear,
                    },
                ];
                effects.extend(push_status(&state, tab_id));
                effects
            }
        }
        Msg::InjectionFailed { tab_id, reason } => {
            fail_init(&mut state, tab_id, &reason)
        }
        Msg::DriverInitFailed { tab_id, reason } => {
            fail_init(&mut state, tab_id, &reason)
        }
        Msg::DriverProgress {
            tab_id,
            status,
            items_processed,
            total_items,
        } => {
            if state.tab(tab_id).is_none() {
                return (state, Vec::new());
            }
            let tab = state.tab_mut(tab_id);
            tab.last_status = status;
            tab.items_processed = items_processed;
            tab.total_items = total_items;
            // Progress only elevates to Running from the start of a job; a
            // report racing a stop request must not resurrect the job.
            if matches!(tab.ui_state, UiState::Starting | UiState::Running) {
                tab.ui_state = UiState::Running;
                tab.is_running = true;
            }
            push_status(&state, tab_id).into_iter().collect()
        }
        Msg::DriverFinished {
            tab_id,
            failed,
            items_processed,
            total_items,
        } => {
            if state.tab(tab_id).is_none() {
                return (state, Vec::new());
            }
            let failed_count = failed.len();
            let tab = state.tab_mut(tab_id);
            tab.is_running = false;
            tab.items_processed = items_processed;
            tab.total_items = total_items;
            let mut effects = Vec::new();
            if failed_count == 0 {
                tab.ui_state = UiState::CompletedSuccess;
                tab.last_status = "Automation completed successfully!".to_string();
                effects.push(Effect::SetBadge {
                    tab_id,
                    badge: Badge::Done,
                });
            } else {
                tab.ui_state = UiState::CompletedErrors;
                tab.last_status =
                    format!("Automation completed with errors ({failed_count} failed).");
                effects.push(Effect::SetBadge {
                    tab_id,
                    badge: Badge::Failed,
                });
                effects.push(Effect::ShowFailedItems { tab_id });
            }
            effects.extend(push_status(&state, tab_id));
            effects
        }
        Msg::DriverStopped { tab_id } => {
            if state.tab(tab_id).is_none() {
                return (state, Vec::new());
            }
            let tab = state.tab_mut(tab_id);
            tab.is_running = false;
            tab.ui_state = UiState::Idle;
            tab.last_status = "Automation stopped.".to_string();
            let mut effects = vec![Effect::SetBadge {
                tab_id,
                badge: Badge::Stopped,
            }];
            effects.extend(push_status(&state, tab_id));
            effects
        }
        Msg::TabNavigated { tab_id } => {
            let Some(tab) = state.tab(tab_id) else {
                return (state, Vec::new());
            };
            if tab.is_running {
                // Navigation always wins: the driver instance is gone and
                // cannot be trusted to finish gracefully.
                let tab = state.tab_mut(tab_id);
                tab.is_running = false;
                tab.ui_state = UiState::Idle;
                tab.last_status = "Navigated away, automation stopped.".to_string();
                let mut effects = vec![Effect::SetBadge {
                    tab_id,
                    badge: Badge::Navigated,
                }];
                effects.extend(push_status(&state, tab_id));
                effects
            } else if tab.ui_state != UiState::Idle || tab.last_status != IDLE_STATUS {
                let tab = state.tab_mut(tab_id);
                tab.ui_state = UiState::Idle;
                tab.last_status = "Idle (page navigated).".to_string();
                let mut effects = vec![Effect::SetBadge {
                    tab_id,
                    badge: Badge::Clear,
                }];
                effects.extend(push_status(&state, tab_id));
                effects
            } else {
                Vec::new()
            }
        }
        Msg::TabClosed { tab_id } => {
            if state.remove_tab(tab_id) {
                vec![Effect::SetBadge {
                    tab_id,
                    badge: Badge::Clear,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn fail_init(state: &mut ControllerState, tab_id: TabId, reason: &str) -> Vec<Effect> {
    let tab = state.tab_mut(tab_id);
    tab.is_running = false;
    tab.ui_state = UiState::ErroredInit;
    tab.last_status = format!("Automation failed to start: {reason}");
    let mut effects = vec![Effect::SetBadge {
        tab_id,
        badge: Badge::Error,
    }];
    effects.extend(push_status(state, tab_id));
    effects
}

fn push_status(state: &ControllerState, tab_id: TabId) -> Option<Effect> {
    state.panel_channel(tab_id).map(|channel| Effect::PushStatus {
        channel: channel.clone(),
        tab_id,
        snapshot: state.snapshot(tab_id),
    })
}
