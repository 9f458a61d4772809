use std::collections::HashSet;
use std::sync::{Mutex, Once};

use formpilot_core::FieldKind;
use formpilot_driver::{
    run_form_step, CancelToken, DriverEvent, DriverSettings, EntryFormPage, EventSink,
    MemoryStore, PageError, StateStore, StoredState,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pilot_logging::initialize_for_tests);
}

#[derive(Default)]
struct VecSink {
    events: Mutex<Vec<DriverEvent>>,
}

impl EventSink for VecSink {
    fn emit(&self, event: DriverEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl VecSink {
    fn last(&self) -> DriverEvent {
        self.events.lock().unwrap().last().cloned().expect("events")
    }
}

#[derive(Default)]
struct ScriptedForm {
    filled: Mutex<Vec<(FieldKind, String)>>,
    submitted: Mutex<Vec<String>>,
    missing_options: HashSet<String>,
    fail_fill_for: Option<String>,
}

#[async_trait::async_trait]
impl EntryFormPage for ScriptedForm {
    async fn fill_field(&self, field: FieldKind, value: &str) -> Result<(), PageError> {
        if self.fail_fill_for.as_deref() == Some(value) {
            return Err(PageError::ElementNotFound(format!(
                "input field for '{value}'"
            )));
        }
        self.filled.lock().unwrap().push((field, value.to_string()));
        Ok(())
    }

    async fn select_expected_impact(&self, label: &str) -> Result<bool, PageError> {
        Ok(!self.missing_options.contains(label))
    }

    async fn submit_save_and_new(&self) -> Result<(), PageError> {
        let last = self.filled.lock().unwrap().last().cloned();
        self.submitted
            .lock()
            .unwrap()
            .push(last.map(|(_, v)| v).unwrap_or_default());
        Ok(())
    }
}

fn seeded_store(lines: &[&str]) -> MemoryStore {
    MemoryStore::seeded(StoredState {
        pending_work_items: lines.iter().map(|l| (*l).to_string()).collect(),
        pending_items_timestamp: Some(1),
        job_total: lines.len() as u32,
        last_failed_items: Vec::new(),
    })
}

async fn step(page: &ScriptedForm, store: &MemoryStore, sink: &VecSink) {
    run_form_step(
        page,
        &DriverSettings::instant(),
        &CancelToken::new(),
        store,
        sink,
    )
    .await;
}

#[tokio::test]
async fn one_item_per_invocation_until_queue_is_empty() {
    init_logging();
    let page = ScriptedForm::default();
    let store = seeded_store(&["SC-123456,High", "654321,Low"]);
    let sink = VecSink::default();

    // First page lifetime: the head record is submitted and popped.
    step(&page, &store, &sink).await;
    assert_eq!(sink.last(), DriverEvent::AwaitingReload { remaining: 1 });
    let stored = store.load().unwrap();
    assert_eq!(stored.pending_work_items, vec!["654321,Low".to_string()]);
    assert_eq!(stored.items_processed(), 1);

    // Fresh instance after the reload resumes from the persisted queue.
    step(&page, &store, &sink).await;
    assert_eq!(sink.last(), DriverEvent::AwaitingReload { remaining: 0 });

    // Final instance finds an empty queue and declares completion.
    step(&page, &store, &sink).await;
    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: Vec::new(),
            items_processed: 2,
            total_items: 2,
        }
    );
    assert!(store.load().unwrap().pending_items_timestamp.is_none());

    let filled = page.filled.lock().unwrap().clone();
    assert_eq!(
        filled,
        vec![
            (FieldKind::ServiceComponent, "SC-123456".to_string()),
            (FieldKind::ServiceNumber, "654321".to_string()),
        ]
    );
}

#[tokio::test]
async fn invalid_record_is_skipped_in_place_without_a_reload() {
    init_logging();
    let page = ScriptedForm::default();
    let store = seeded_store(&["not a record", "SC-123456,High"]);
    let sink = VecSink::default();

    step(&page, &store, &sink).await;

    // The bad line was consumed and recorded, the valid one submitted, all
    // within a single page lifetime.
    assert_eq!(sink.last(), DriverEvent::AwaitingReload { remaining: 0 });
    let stored = store.load().unwrap();
    assert_eq!(stored.last_failed_items, vec!["not a record".to_string()]);

    step(&page, &store, &sink).await;
    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: vec!["not a record".to_string()],
            items_processed: 2,
            total_items: 2,
        }
    );
}

#[tokio::test]
async fn missing_dropdown_option_fails_only_that_record() {
    init_logging();
    let page = ScriptedForm {
        missing_options: HashSet::from(["Apocalyptic".to_string()]),
        ..ScriptedForm::default()
    };
    let store = seeded_store(&["SC-111111,Apocalyptic", "SC-222222,High"]);
    let sink = VecSink::default();

    step(&page, &store, &sink).await;

    assert_eq!(sink.last(), DriverEvent::AwaitingReload { remaining: 0 });
    assert_eq!(
        store.load().unwrap().last_failed_items,
        vec!["SC-111111,Apocalyptic".to_string()]
    );
    assert_eq!(page.submitted.lock().unwrap().clone(), vec!["SC-222222"]);
}

#[tokio::test]
async fn unfillable_field_fails_only_that_record() {
    init_logging();
    let page = ScriptedForm {
        fail_fill_for: Some("SC-111111".to_string()),
        ..ScriptedForm::default()
    };
    let store = seeded_store(&["SC-111111,High", "SC-222222,High"]);
    let sink = VecSink::default();

    step(&page, &store, &sink).await;
    step(&page, &store, &sink).await;

    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: vec!["SC-111111,High".to_string()],
            items_processed: 2,
            total_items: 2,
        }
    );
}

#[tokio::test]
async fn stop_flag_exits_before_touching_the_queue() {
    init_logging();
    let page = ScriptedForm::default();
    let store = seeded_store(&["SC-123456,High"]);
    let sink = VecSink::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    run_form_step(&page, &DriverSettings::instant(), &cancel, &store, &sink).await;

    assert_eq!(
        sink.last(),
        DriverEvent::Stopped {
            items_processed: 0,
            total_items: 1,
        }
    );
    assert_eq!(store.load().unwrap().pending_work_items.len(), 1);
    assert!(page.filled.lock().unwrap().is_empty());
}
