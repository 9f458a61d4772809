use std::collections::HashMap;
use std::sync::{Mutex, Once};

use formpilot_core::WorkItem;
use formpilot_driver::{
    run_search_job, CancelToken, DriverEvent, DriverSettings, EventSink, Key, MemoryStore,
    SearchPage, StateStore, StoredState,
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

/// Scripted page: result rows per typed value, optional locate failures, and
/// an optional trigger that raises the stop flag when a given value is typed.
struct ScriptedPage {
    results: HashMap<String, Vec<String>>,
    locate_failures: Mutex<u32>,
    typed: Mutex<Vec<String>>,
    current: Mutex<String>,
    cancel_on_type: Option<(String, CancelToken)>,
}

impl ScriptedPage {
    fn new(results: &[(&str, &[&str])]) -> Self {
        Self {
            results: results
                .iter()
                .map(|(k, rows)| {
                    (
                        (*k).to_string(),
                        rows.iter().map(|r| (*r).to_string()).collect(),
                    )
                })
                .collect(),
            locate_failures: Mutex::new(0),
            typed: Mutex::new(Vec::new()),
            current: Mutex::new(String::new()),
            cancel_on_type: None,
        }
    }

    fn with_locate_failures(mut self, count: u32) -> Self {
        *self.locate_failures.get_mut().unwrap() = count;
        self
    }

    fn typed_values(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchPage for ScriptedPage {
    async fn locate_search_input(&self) -> bool {
        let mut failures = self.locate_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            false
        } else {
            true
        }
    }

    async fn set_input_value(&self, text: &str) -> Result<(), formpilot_driver::PageError> {
        self.typed.lock().unwrap().push(text.to_string());
        *self.current.lock().unwrap() = text.to_string();
        if let Some((trigger, cancel)) = &self.cancel_on_type {
            if trigger == text {
                cancel.cancel();
            }
        }
        Ok(())
    }

    async fn send_key(&self, _key: Key) -> Result<(), formpilot_driver::PageError> {
        Ok(())
    }

    async fn loading_indicator_cleared(&self) -> bool {
        true
    }

    async fn visible_results(&self) -> Vec<String> {
        let current = self.current.lock().unwrap().clone();
        self.results.get(&current).cloned().unwrap_or_default()
    }

    async fn clear_input(&self) -> Result<(), formpilot_driver::PageError> {
        self.current.lock().unwrap().clear();
        Ok(())
    }
}

fn search_items(terms: &[&str]) -> Vec<WorkItem> {
    terms
        .iter()
        .map(|t| WorkItem::Search((*t).to_string()))
        .collect()
}

#[tokio::test]
async fn clean_run_processes_every_item() {
    init_logging();
    let page = ScriptedPage::new(&[
        ("CKT-100", &["CKT-100 / primary"]),
        ("CKT-200", &["CKT-200"]),
    ]);
    let store = MemoryStore::new();
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["CKT-100", "CKT-200"]),
        &DriverSettings::instant(),
        &CancelToken::new(),
        &store,
        &sink,
    )
    .await;

    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: Vec::new(),
            items_processed: 2,
            total_items: 2,
        }
    );
    assert_eq!(page.typed_values(), vec!["CKT-100", "CKT-200"]);
}

#[tokio::test]
async fn item_without_matching_result_is_recorded_and_skipped() {
    init_logging();
    // "B" never yields a result; "A" and "C" do.
    let page = ScriptedPage::new(&[("A", &["A"]), ("C", &["C"])]);
    let store = MemoryStore::new();
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["A", "B", "C"]),
        &DriverSettings::instant(),
        &CancelToken::new(),
        &store,
        &sink,
    )
    .await;

    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: vec!["B".to_string()],
            items_processed: 3,
            total_items: 3,
        }
    );
    // Failed items survive in the shared store for the dedicated view.
    assert_eq!(
        store.load().unwrap().last_failed_items,
        vec!["B".to_string()]
    );
}

#[tokio::test]
async fn locate_retries_then_succeeds() {
    init_logging();
    let page = ScriptedPage::new(&[("A", &["A"])]).with_locate_failures(2);
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["A"]),
        &DriverSettings::instant(),
        &CancelToken::new(),
        &MemoryStore::new(),
        &sink,
    )
    .await;

    assert_eq!(
        sink.last(),
        DriverEvent::Finished {
            failed: Vec::new(),
            items_processed: 1,
            total_items: 1,
        }
    );
}

#[tokio::test]
async fn unlocatable_input_fails_the_job_at_init() {
    init_logging();
    let page = ScriptedPage::new(&[]).with_locate_failures(u32::MAX);
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["A"]),
        &DriverSettings::instant(),
        &CancelToken::new(),
        &MemoryStore::new(),
        &sink,
    )
    .await;

    let DriverEvent::InitFailed { reason } = sink.last() else {
        panic!("expected InitFailed, got {:?}", sink.last());
    };
    assert!(reason.contains("search input not found"), "{reason}");
    assert!(page.typed_values().is_empty());
}

#[tokio::test]
async fn stop_during_item_k_starts_nothing_beyond_k() {
    init_logging();
    let cancel = CancelToken::new();
    let mut page = ScriptedPage::new(&[("A", &["A"]), ("B", &["B"]), ("C", &["C"])]);
    page.cancel_on_type = Some(("B".to_string(), cancel.clone()));
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["A", "B", "C"]),
        &DriverSettings::instant(),
        &cancel,
        &MemoryStore::new(),
        &sink,
    )
    .await;

    assert_eq!(
        sink.last(),
        DriverEvent::Stopped {
            items_processed: 1,
            total_items: 3,
        }
    );
    // "C" was never touched.
    assert_eq!(page.typed_values(), vec!["A", "B"]);
}

#[tokio::test]
async fn new_run_clears_previous_failed_items() {
    init_logging();
    let store = MemoryStore::seeded(StoredState {
        last_failed_items: vec!["OLD".to_string()],
        ..StoredState::default()
    });
    let page = ScriptedPage::new(&[("A", &["A"])]);
    let sink = VecSink::default();

    run_search_job(
        &page,
        &search_items(&["A"]),
        &DriverSettings::instant(),
        &CancelToken::new(),
        &store,
        &sink,
    )
    .await;

    assert!(store.load().unwrap().last_failed_items.is_empty());
}

#[test]
fn result_matching_normalizes_decorated_rows() {
    use formpilot_driver::{matches_expected_result, normalize_search_key};

    assert_eq!(normalize_search_key("ab / 12-34 //ZYO"), "AB1234");
    assert!(matches_expected_result("AB-1234", "ab / 12-34 //ZYO"));
    assert!(matches_expected_result("ab1234", "AB-1234 (primary route)"));
    assert!(!matches_expected_result("AB-1234", "CD-9999"));
    assert!(!matches_expected_result("", "CD-9999"));
}
