//! Demo binary: wires the controller runtime, a driver bound to a scripted
//! page, and a panel, then runs a small search job end to end. The real
//! deployment replaces `DemoSearchPage` with an adapter for the live page.

mod logging;
mod panel;
mod persistence;
mod runtime;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use formpilot_driver::{DriverHandle, DriverSettings, JsonFileStore, Key, PageError, SearchPage};
use pilot_logging::pilot_info;

use crate::logging::LogDestination;
use crate::panel::Panel;
use crate::runtime::{ControllerRuntime, JobMode};

const DEMO_TAB: u32 = 1;

/// Scripted page: every circuit except `CKT-404` shows up in the results.
#[derive(Default)]
struct DemoSearchPage {
    query: std::sync::Mutex<String>,
}

#[async_trait::async_trait]
impl SearchPage for DemoSearchPage {
    async fn locate_search_input(&self) -> bool {
        true
    }

    async fn set_input_value(&self, text: &str) -> Result<(), PageError> {
        *self.query.lock().unwrap_or_else(|e| e.into_inner()) = text.to_string();
        Ok(())
    }

    async fn send_key(&self, _key: Key) -> Result<(), PageError> {
        Ok(())
    }

    async fn loading_indicator_cleared(&self) -> bool {
        true
    }

    async fn visible_results(&self) -> Vec<String> {
        let query = self.query.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if query.contains("404") {
            Vec::new()
        } else {
            vec![query]
        }
    }

    async fn clear_input(&self) -> Result<(), PageError> {
        self.query.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

fn demo_settings() -> DriverSettings {
    DriverSettings {
        typing_delay: Duration::from_millis(2),
        after_typing_wait: Duration::from_millis(20),
        before_enter_wait: Duration::from_millis(10),
        after_enter_wait: Duration::from_millis(50),
        after_clear_wait: Duration::from_millis(10),
        result_timeout: Duration::from_millis(100),
        ..DriverSettings::instant()
    }
}

fn main() -> anyhow::Result<()> {
    logging::initialize(LogDestination::Both);

    let work_dir = std::env::temp_dir().join("formpilot_demo");
    std::fs::create_dir_all(&work_dir)?;
    let store = Arc::new(JsonFileStore::new(work_dir.join("store.json")));

    let driver = DriverHandle::for_search(
        Arc::new(DemoSearchPage::default()),
        store.clone(),
        demo_settings(),
    );
    let controller = ControllerRuntime::spawn(driver, store, JobMode::Search);

    let mut panel = Panel::open(
        controller,
        DEMO_TAB,
        JobMode::Search,
        work_dir.join("draft.ron"),
    );
    pilot_info!("Panel opened: {}", panel.view().status_line);

    panel.input_changed("CKT-100\nCKT-404\nCKT-200");
    panel.start("CKT-100\nCKT-404\nCKT-200");

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if panel.pump() {
            pilot_info!("Panel: {}", panel.view().status_line);
        }
        if panel.view().start_enabled && panel.view().status_line.starts_with("Automation") {
            break;
        }
        if Instant::now() > deadline {
            bail!("demo job did not finish in time");
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    if !panel.view().failed_items.is_empty() {
        pilot_info!("Failed items: {:?}", panel.view().failed_items);
    }
    panel.close();
    Ok(())
}
