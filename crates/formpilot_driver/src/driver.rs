use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use formpilot_core::WorkItem;
use pilot_logging::pilot_warn;

use crate::{
    run_form_step, run_search_job, CancelToken, ChannelEventSink, DriverEvent, DriverSettings,
    EntryFormPage, EventSink, JobId, SearchPage, StateStore, StoredState,
};

#[derive(Debug)]
enum DriverCommand {
    StartSearch {
        job: JobId,
        items: Vec<WorkItem>,
        cancel: CancelToken,
    },
    StartFormJob {
        job: JobId,
        lines: Vec<String>,
        cancel: CancelToken,
    },
    ContinueFormJob {
        job: JobId,
        cancel: CancelToken,
    },
}

enum PageBinding {
    Search(Arc<dyn SearchPage>),
    Form(Arc<dyn EntryFormPage>),
}

/// Handle to the driver worker. Commands run one at a time on a dedicated
/// thread (jobs are strictly sequential per tab); events stream back over a
/// channel polled by the runtime, each tagged with its job.
///
/// Every job gets its own cancellation token, created when the job is
/// dispatched. A stop therefore lands on the job the caller last started
/// even when the worker has not dequeued it yet, and can never bleed into a
/// job dispatched later.
pub struct DriverHandle {
    cmd_tx: mpsc::Sender<DriverCommand>,
    event_rx: mpsc::Receiver<(JobId, DriverEvent)>,
    current_cancel: Mutex<CancelToken>,
    next_job: AtomicU64,
}

impl DriverHandle {
    pub fn for_search(
        page: Arc<dyn SearchPage>,
        store: Arc<dyn StateStore>,
        settings: DriverSettings,
    ) -> Self {
        Self::new(PageBinding::Search(page), store, settings)
    }

    pub fn for_form(
        page: Arc<dyn EntryFormPage>,
        store: Arc<dyn StateStore>,
        settings: DriverSettings,
    ) -> Self {
        Self::new(PageBinding::Form(page), store, settings)
    }

    fn new(binding: PageBinding, store: Arc<dyn StateStore>, settings: DriverSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                match (&binding, command) {
                    (
                        PageBinding::Search(page),
                        DriverCommand::StartSearch { job, items, cancel },
                    ) => {
                        let sink = ChannelEventSink::new(event_tx.clone(), job);
                        runtime.block_on(run_search_job(
                            page.as_ref(),
                            &items,
                            &settings,
                            &cancel,
                            store.as_ref(),
                            &sink,
                        ));
                    }
                    (
                        PageBinding::Form(page),
                        DriverCommand::StartFormJob { job, lines, cancel },
                    ) => {
                        let sink = ChannelEventSink::new(event_tx.clone(), job);
                        let stored = StoredState {
                            job_total: lines.len() as u32,
                            pending_work_items: lines,
                            pending_items_timestamp: Some(epoch_millis()),
                            last_failed_items: Vec::new(),
                        };
                        if let Err(err) = store.save(&stored) {
                            sink.emit(DriverEvent::InitFailed {
                                reason: format!("could not persist work queue: {err}"),
                            });
                            continue;
                        }
                        runtime.block_on(run_form_step(
                            page.as_ref(),
                            &settings,
                            &cancel,
                            store.as_ref(),
                            &sink,
                        ));
                    }
                    (PageBinding::Form(page), DriverCommand::ContinueFormJob { job, cancel }) => {
                        let sink = ChannelEventSink::new(event_tx.clone(), job);
                        runtime.block_on(run_form_step(
                            page.as_ref(),
                            &settings,
                            &cancel,
                            store.as_ref(),
                            &sink,
                        ));
                    }
                    (_, command) => {
                        pilot_warn!("Command {command:?} not supported by this driver variant");
                    }
                }
            }
        });

        Self {
            cmd_tx,
            event_rx,
            current_cancel: Mutex::new(CancelToken::new()),
            next_job: AtomicU64::new(1),
        }
    }

    /// Run a whole search list within the current page lifetime. Returns
    /// the job id, or `None` when the worker is gone and nothing could be
    /// dispatched.
    #[must_use]
    pub fn start_search(&self, items: Vec<WorkItem>) -> Option<JobId> {
        let (job, cancel) = self.new_job();
        self.cmd_tx
            .send(DriverCommand::StartSearch { job, items, cancel })
            .ok()?;
        Some(job)
    }

    /// Seed the persisted queue with raw form lines and process the first.
    #[must_use]
    pub fn start_form_job(&self, lines: Vec<String>) -> Option<JobId> {
        let (job, cancel) = self.new_job();
        self.cmd_tx
            .send(DriverCommand::StartFormJob { job, lines, cancel })
            .ok()?;
        Some(job)
    }

    /// Re-enter the form loop of an in-flight job after the page reloaded.
    #[must_use]
    pub fn continue_form_job(&self, job: JobId) -> bool {
        let cancel = self.current_cancel.lock().expect("cancel lock").clone();
        self.cmd_tx
            .send(DriverCommand::ContinueFormJob { job, cancel })
            .is_ok()
    }

    /// Raise the cooperative stop flag of the most recently started job.
    pub fn stop(&self) {
        self.current_cancel.lock().expect("cancel lock").cancel();
    }

    pub fn try_recv(&self) -> Option<(JobId, DriverEvent)> {
        self.event_rx.try_recv().ok()
    }

    /// Allocates a job id with a fresh token and makes it the stop target.
    fn new_job(&self) -> (JobId, CancelToken) {
        let job = self.next_job.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        *self.current_cancel.lock().expect("cancel lock") = cancel.clone();
        (job, cancel)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
