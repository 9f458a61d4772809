use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use formpilot_core::WorkItem;
use formpilot_driver::{
    DriverEvent, DriverHandle, DriverSettings, JobId, Key, MemoryStore, PageError, SearchPage,
    StateStore,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pilot_logging::initialize_for_tests);
}

/// Page where every query matches its own echo row.
struct EchoPage;

#[async_trait::async_trait]
impl SearchPage for EchoPage {
    async fn locate_search_input(&self) -> bool {
        true
    }

    async fn set_input_value(&self, _text: &str) -> Result<(), PageError> {
        Ok(())
    }

    async fn send_key(&self, _key: Key) -> Result<(), PageError> {
        Ok(())
    }

    async fn loading_indicator_cleared(&self) -> bool {
        true
    }

    async fn visible_results(&self) -> Vec<String> {
        vec!["CKT-100".to_string(), "CKT-200".to_string()]
    }

    async fn clear_input(&self) -> Result<(), PageError> {
        Ok(())
    }
}

fn drain_until_terminal(handle: &DriverHandle) -> Vec<(JobId, DriverEvent)> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Some((job, event)) = handle.try_recv() {
            let terminal = matches!(
                event,
                DriverEvent::Finished { .. }
                    | DriverEvent::Stopped { .. }
                    | DriverEvent::InitFailed { .. }
            );
            events.push((job, event));
            if terminal {
                return events;
            }
        } else {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    panic!("driver produced no terminal event; got {events:?}");
}

#[test]
fn handle_runs_a_search_job_on_its_worker() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let handle = DriverHandle::for_search(Arc::new(EchoPage), store, DriverSettings::instant());

    let job = handle
        .start_search(vec![
            WorkItem::Search("CKT-100".to_string()),
            WorkItem::Search("CKT-200".to_string()),
        ])
        .expect("worker running");

    let events = drain_until_terminal(&handle);
    assert!(matches!(
        events.last(),
        Some((j, DriverEvent::Finished {
            failed,
            items_processed: 2,
            total_items: 2,
        })) if failed.is_empty() && *j == job
    ));
    // The first report is the initialization status.
    assert!(matches!(
        events.first(),
        Some((_, DriverEvent::Progress { status, .. })) if status == "Initializing automation..."
    ));
}

#[test]
fn stop_issued_before_the_worker_dequeues_still_stops_the_job() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    // Each item pauses long enough that the stop always lands first.
    let settings = DriverSettings {
        after_typing_wait: Duration::from_millis(50),
        ..DriverSettings::instant()
    };
    let handle = DriverHandle::for_search(Arc::new(EchoPage), store, settings);

    let job = handle
        .start_search(vec![
            WorkItem::Search("CKT-100".to_string()),
            WorkItem::Search("CKT-200".to_string()),
            WorkItem::Search("CKT-300".to_string()),
        ])
        .expect("worker running");
    // The worker may not even have dequeued the command yet; the stop must
    // still apply to this job, not be lost.
    handle.stop();

    let events = drain_until_terminal(&handle);
    let Some((
        j,
        DriverEvent::Stopped {
            items_processed, ..
        },
    )) = events.last()
    else {
        panic!("expected Stopped, got {events:?}");
    };
    assert_eq!(*j, job);
    assert_eq!(*items_processed, 0);
}

#[test]
fn sequential_jobs_report_under_distinct_job_ids() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let handle = DriverHandle::for_search(Arc::new(EchoPage), store, DriverSettings::instant());

    let first = handle
        .start_search(vec![WorkItem::Search("CKT-100".to_string())])
        .expect("worker running");
    let first_events = drain_until_terminal(&handle);

    let second = handle
        .start_search(vec![WorkItem::Search("CKT-200".to_string())])
        .expect("worker running");
    let second_events = drain_until_terminal(&handle);

    assert_ne!(first, second);
    assert!(first_events.iter().all(|(j, _)| *j == first));
    assert!(second_events.iter().all(|(j, _)| *j == second));
}

#[test]
fn handle_seeds_the_store_for_form_jobs() {
    init_logging();
    struct NoopForm;

    #[async_trait::async_trait]
    impl formpilot_driver::EntryFormPage for NoopForm {
        async fn fill_field(
            &self,
            _field: formpilot_core::FieldKind,
            _value: &str,
        ) -> Result<(), PageError> {
            Ok(())
        }

        async fn select_expected_impact(&self, _label: &str) -> Result<bool, PageError> {
            Ok(true)
        }

        async fn submit_save_and_new(&self) -> Result<(), PageError> {
            Ok(())
        }
    }

    let store = Arc::new(MemoryStore::new());
    let handle =
        DriverHandle::for_form(Arc::new(NoopForm), store.clone(), DriverSettings::instant());

    assert!(handle
        .start_form_job(vec!["SC-123456,High".to_string()])
        .is_some());

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match handle.try_recv() {
            Some((_, DriverEvent::AwaitingReload { remaining })) => {
                assert_eq!(remaining, 0);
                break;
            }
            Some(_) => {}
            None if Instant::now() > deadline => panic!("no AwaitingReload event"),
            None => std::thread::sleep(Duration::from_millis(5)),
        }
    }

    let stored = store.load().unwrap();
    assert_eq!(stored.job_total, 1);
    assert!(stored.pending_work_items.is_empty());
    assert!(stored.pending_items_timestamp.is_some());
}
