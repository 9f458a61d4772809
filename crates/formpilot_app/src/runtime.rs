//! Controller runtime: owns the pure controller state, executes its effects,
//! and bridges panel requests and driver events onto the controller's message
//! queue. Runs on a dedicated thread so panels stay responsive while a job
//! is in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use formpilot_core::{
    update, ChannelId, ControllerState, Effect, Msg, Reply, StartReply, StateSnapshot, StopReply,
    TabId, WorkItem,
};
use formpilot_driver::{DriverEvent, DriverHandle, JobId, StateStore};
use pilot_logging::{clear_active_tab, pilot_debug, pilot_info, pilot_warn, set_active_tab};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Which page surface the driver is bound to. A runtime drives exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Search,
    Form,
}

/// Asynchronous updates pushed to a connected panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Snapshot {
        tab_id: TabId,
        snapshot: StateSnapshot,
    },
    FailedItems {
        tab_id: TabId,
        items: Vec<String>,
    },
}

enum RuntimeRequest {
    Connect {
        channel: ChannelId,
        tx: mpsc::Sender<StatusUpdate>,
    },
    Disconnect {
        channel: ChannelId,
    },
    RequestState {
        tab_id: TabId,
        channel: Option<ChannelId>,
        reply: mpsc::Sender<Reply>,
    },
    StartJob {
        tab_id: TabId,
        items: Vec<WorkItem>,
        reply: mpsc::Sender<Reply>,
    },
    StopJob {
        tab_id: TabId,
        reply: mpsc::Sender<Reply>,
    },
    TabNavigated {
        tab_id: TabId,
    },
    TabClosed {
        tab_id: TabId,
    },
}

/// Cloneable front for talking to a running [`ControllerRuntime`].
#[derive(Clone)]
pub struct ControllerHandle {
    request_tx: mpsc::Sender<RuntimeRequest>,
}

impl ControllerHandle {
    /// Registers a panel channel and returns its update stream. The channel
    /// stays pending until the first state request names a tab.
    pub fn connect_panel(&self, channel: &str) -> mpsc::Receiver<StatusUpdate> {
        let (tx, rx) = mpsc::channel();
        let _ = self.request_tx.send(RuntimeRequest::Connect {
            channel: channel.to_owned(),
            tx,
        });
        rx
    }

    pub fn disconnect_panel(&self, channel: &str) {
        let _ = self.request_tx.send(RuntimeRequest::Disconnect {
            channel: channel.to_owned(),
        });
    }

    /// Fetches the current snapshot for a tab, linking `channel` to that tab
    /// when given. Unknown tabs report as idle.
    pub fn request_state(
        &self,
        tab_id: TabId,
        channel: Option<&str>,
    ) -> anyhow::Result<StateSnapshot> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.request_tx
            .send(RuntimeRequest::RequestState {
                tab_id,
                channel: channel.map(str::to_owned),
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("controller is not running"))?;
        match reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .context("controller did not answer the state request")?
        {
            Reply::State(snapshot) => Ok(snapshot),
            other => Err(anyhow!("unexpected reply to state request: {other:?}")),
        }
    }

    pub fn start_job(&self, tab_id: TabId, items: Vec<WorkItem>) -> anyhow::Result<StartReply> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.request_tx
            .send(RuntimeRequest::StartJob {
                tab_id,
                items,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("controller is not running"))?;
        match reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .context("controller did not answer the start request")?
        {
            Reply::Start(reply) => Ok(reply),
            other => Err(anyhow!("unexpected reply to start request: {other:?}")),
        }
    }

    pub fn stop_job(&self, tab_id: TabId) -> anyhow::Result<StopReply> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.request_tx
            .send(RuntimeRequest::StopJob {
                tab_id,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("controller is not running"))?;
        match reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .context("controller did not answer the stop request")?
        {
            Reply::Stop(reply) => Ok(reply),
            other => Err(anyhow!("unexpected reply to stop request: {other:?}")),
        }
    }

    /// Reports a page navigation the driver did not ask for.
    pub fn tab_navigated(&self, tab_id: TabId) {
        let _ = self
            .request_tx
            .send(RuntimeRequest::TabNavigated { tab_id });
    }

    pub fn tab_closed(&self, tab_id: TabId) {
        let _ = self.request_tx.send(RuntimeRequest::TabClosed { tab_id });
    }
}

/// Event-loop state for the controller thread.
pub struct ControllerRuntime {
    state: ControllerState,
    driver: DriverHandle,
    mode: JobMode,
    store: std::sync::Arc<dyn StateStore>,
    panels: HashMap<ChannelId, mpsc::Sender<StatusUpdate>>,
    /// The job the driver is currently working, and the tab it belongs to.
    active_job: Option<(JobId, TabId)>,
    request_rx: mpsc::Receiver<RuntimeRequest>,
}

impl ControllerRuntime {
    /// Spawns the controller thread and returns a handle to it. The thread
    /// exits once every [`ControllerHandle`] clone has been dropped.
    pub fn spawn(
        driver: DriverHandle,
        store: std::sync::Arc<dyn StateStore>,
        mode: JobMode,
    ) -> ControllerHandle {
        let (request_tx, request_rx) = mpsc::channel();
        let mut runtime = ControllerRuntime {
            state: ControllerState::new(),
            driver,
            mode,
            store,
            panels: HashMap::new(),
            active_job: None,
            request_rx,
        };
        thread::spawn(move || runtime.run());
        ControllerHandle { request_tx }
    }

    fn run(&mut self) {
        loop {
            let mut worked = false;

            match self.request_rx.try_recv() {
                Ok(request) => {
                    self.handle_request(request);
                    worked = true;
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    pilot_info!("All controller handles dropped; shutting down");
                    return;
                }
            }

            if let Some((job, event)) = self.driver.try_recv() {
                self.handle_driver_event(job, event);
                worked = true;
            }

            if !worked {
                thread::sleep(Duration::from_millis(20));
            }
        }
    }

    fn handle_request(&mut self, request: RuntimeRequest) {
        match request {
            RuntimeRequest::Connect { channel, tx } => {
                self.panels.insert(channel.clone(), tx);
                self.dispatch(Msg::PanelConnected { channel }, None);
            }
            RuntimeRequest::Disconnect { channel } => {
                self.panels.remove(&channel);
                self.dispatch(Msg::PanelDisconnected { channel }, None);
            }
            RuntimeRequest::RequestState {
                tab_id,
                channel,
                reply,
            } => {
                self.dispatch(Msg::StateRequested { tab_id, channel }, Some(reply));
            }
            RuntimeRequest::StartJob {
                tab_id,
                items,
                reply,
            } => {
                self.dispatch(Msg::StartRequested { tab_id, items }, Some(reply));
            }
            RuntimeRequest::StopJob { tab_id, reply } => {
                self.dispatch(Msg::StopRequested { tab_id }, Some(reply));
            }
            RuntimeRequest::TabNavigated { tab_id } => {
                self.dispatch(Msg::TabNavigated { tab_id }, None);
            }
            RuntimeRequest::TabClosed { tab_id } => {
                self.dispatch(Msg::TabClosed { tab_id }, None);
            }
        }
    }

    /// Translates a driver report into a controller message. Reports carry
    /// the job that produced them; only reports from the active job count.
    /// A report from a superseded job (stopped, then replaced before its
    /// final event drained) must not be attributed to the job running now.
    fn handle_driver_event(&mut self, job: JobId, event: DriverEvent) {
        let Some((active_job, tab_id)) = self.active_job else {
            pilot_debug!("Dropping driver event with no active job: {event:?}");
            return;
        };
        if job != active_job {
            pilot_debug!("Dropping event from superseded job {job}: {event:?}");
            return;
        }
        let msg = match event {
            DriverEvent::Progress {
                status,
                items_processed,
                total_items,
            } => Msg::DriverProgress {
                tab_id,
                status,
                items_processed,
                total_items,
            },
            DriverEvent::Finished {
                failed,
                items_processed,
                total_items,
            } => {
                self.clear_active_tab();
                Msg::DriverFinished {
                    tab_id,
                    failed,
                    items_processed,
                    total_items,
                }
            }
            DriverEvent::Stopped {
                items_processed,
                total_items,
            } => {
                pilot_info!("Driver stopped after {items_processed}/{total_items} item(s)");
                self.clear_active_tab();
                Msg::DriverStopped { tab_id }
            }
            DriverEvent::InitFailed { reason } => {
                self.clear_active_tab();
                Msg::DriverInitFailed { tab_id, reason }
            }
            DriverEvent::AwaitingReload { remaining } => {
                // An expected reload: the page is coming back with the same
                // driver binding, so re-enter the loop rather than treating
                // it as a navigation.
                pilot_info!("Form page reloading, {remaining} item(s) remaining");
                if !self.driver.continue_form_job(job) {
                    self.dispatch(
                        Msg::DriverInitFailed {
                            tab_id,
                            reason: "driver worker unavailable".to_owned(),
                        },
                        None,
                    );
                    self.clear_active_tab();
                }
                return;
            }
        };
        self.dispatch(msg, None);
    }

    fn dispatch(&mut self, msg: Msg, reply: Option<mpsc::Sender<Reply>>) {
        let mut queue = VecDeque::new();
        queue.push_back((msg, reply));
        while let Some((msg, reply)) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                for follow_up in self.execute(effect, reply.as_ref()) {
                    queue.push_back((follow_up, None));
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect, reply: Option<&mpsc::Sender<Reply>>) -> Vec<Msg> {
        match effect {
            Effect::Reply(value) => {
                match reply {
                    Some(tx) => {
                        let _ = tx.send(value);
                    }
                    None => pilot_warn!("Reply effect with no requester: {value:?}"),
                }
                Vec::new()
            }
            Effect::InjectDriver { tab_id, items } => {
                let dispatched = match self.mode {
                    JobMode::Search => self.driver.start_search(items),
                    JobMode::Form => {
                        let lines = items.iter().map(ToString::to_string).collect();
                        self.driver.start_form_job(lines)
                    }
                };
                match dispatched {
                    Some(job) => {
                        set_active_tab(tab_id);
                        self.active_job = Some((job, tab_id));
                        Vec::new()
                    }
                    None => vec![Msg::InjectionFailed {
                        tab_id,
                        reason: "driver worker unavailable".to_owned(),
                    }],
                }
            }
            Effect::SignalStop { tab_id } => {
                pilot_info!("Signalling stop for tab {tab_id}");
                self.driver.stop();
                Vec::new()
            }
            Effect::PushStatus {
                channel,
                tab_id,
                snapshot,
            } => {
                let delivered = self
                    .panels
                    .get(&channel)
                    .is_some_and(|tx| tx.send(StatusUpdate::Snapshot { tab_id, snapshot }).is_ok());
                if delivered {
                    Vec::new()
                } else {
                    // The receiving end is gone; forget the channel.
                    self.panels.remove(&channel);
                    vec![Msg::PanelDisconnected { channel }]
                }
            }
            Effect::SetBadge { tab_id, badge } => {
                pilot_info!("Badge for tab {tab_id}: {badge:?}");
                Vec::new()
            }
            Effect::ShowFailedItems { tab_id } => {
                let items = match self.store.load() {
                    Ok(stored) => stored.last_failed_items,
                    Err(err) => {
                        pilot_warn!("Could not read failed items from the shared store: {err}");
                        return Vec::new();
                    }
                };
                if items.is_empty() {
                    return Vec::new();
                }
                if let Some(channel) = self.state.panel_channel(tab_id) {
                    if let Some(tx) = self.panels.get(channel) {
                        let _ = tx.send(StatusUpdate::FailedItems { tab_id, items });
                    }
                }
                Vec::new()
            }
        }
    }

    fn clear_active_tab(&mut self) {
        self.active_job = None;
        clear_active_tab();
    }
}
