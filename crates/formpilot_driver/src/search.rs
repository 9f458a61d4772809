use std::time::Instant;

use formpilot_core::WorkItem;
use pilot_logging::{pilot_debug, pilot_info, pilot_warn};

use crate::cancel::{pause, Cancelled};
use crate::{CancelToken, DriverEvent, DriverSettings, EventSink, Key, SearchPage, StateStore};

/// Normalizes a search key for result matching: uppercase, drop the trailing
/// `//ZYO` marker, then strip spaces, slashes, and hyphens.
pub fn normalize_search_key(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let upper = upper.strip_suffix("//ZYO").unwrap_or(&upper);
    upper
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '/' && *c != '-')
        .collect()
}

/// Whether a visible result row satisfies the searched-for item. Rows often
/// carry decoration around the key, so containment is checked both ways.
pub fn matches_expected_result(item: &str, row: &str) -> bool {
    let wanted = normalize_search_key(item);
    let got = normalize_search_key(row);
    if wanted.is_empty() || got.is_empty() {
        return false;
    }
    got.contains(&wanted) || wanted.contains(&got)
}

/// Runs a whole item list within one page lifetime.
///
/// Per-item failures (input never located mid-run, no matching result) are
/// recorded and the loop moves on; only a search input that never appears at
/// all is fatal to the job. The cancellation token is checked before and
/// after every wait.
pub async fn run_search_job(
    page: &dyn SearchPage,
    items: &[WorkItem],
    settings: &DriverSettings,
    cancel: &CancelToken,
    store: &dyn StateStore,
    sink: &dyn EventSink,
) {
    let total = items.len() as u32;
    let mut processed = 0u32;
    let mut failed: Vec<String> = Vec::new();

    sink.emit(DriverEvent::Progress {
        status: "Initializing automation...".to_string(),
        items_processed: 0,
        total_items: total,
    });

    // A new run invalidates the previous run's failed list.
    match store.load() {
        Ok(mut stored) if !stored.last_failed_items.is_empty() => {
            stored.last_failed_items.clear();
            if let Err(err) = store.save(&stored) {
                pilot_warn!("Could not clear previous failed items: {err}");
            }
        }
        Ok(_) => {}
        Err(err) => pilot_warn!("Could not read shared store at run start: {err}"),
    }

    if !locate_input(page, settings, cancel).await {
        if cancel.is_cancelled() {
            sink.emit(DriverEvent::Stopped {
                items_processed: processed,
                total_items: total,
            });
        } else {
            sink.emit(DriverEvent::InitFailed {
                reason: format!(
                    "search input not found after {} attempts",
                    settings.locate_retry_max
                ),
            });
        }
        return;
    }

    for item in items {
        if cancel.is_cancelled() {
            pilot_info!("Stop flag observed after {processed} items");
            sink.emit(DriverEvent::Stopped {
                items_processed: processed,
                total_items: total,
            });
            return;
        }

        let key = item.key();
        sink.emit(DriverEvent::Progress {
            status: format!("Processing item {key}"),
            items_processed: processed + 1,
            total_items: total,
        });

        match process_one(page, key, settings, cancel).await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                pilot_warn!("Item '{key}' failed: {reason}");
                sink.emit(DriverEvent::Progress {
                    status: format!("Error on item '{key}': {reason}"),
                    items_processed: processed + 1,
                    total_items: total,
                });
                failed.push(key.to_string());
                // Best effort; a stuck input only matters for the next item.
                let _ = page.clear_input().await;
            }
            Err(Cancelled) => {
                sink.emit(DriverEvent::Stopped {
                    items_processed: processed,
                    total_items: total,
                });
                return;
            }
        }
        processed += 1;
    }

    if !failed.is_empty() {
        match store.load() {
            Ok(mut stored) => {
                stored.last_failed_items = failed.clone();
                if let Err(err) = store.save(&stored) {
                    pilot_warn!("Could not persist failed items: {err}");
                }
            }
            Err(err) => pilot_warn!("Could not persist failed items: {err}"),
        }
    }

    sink.emit(DriverEvent::Finished {
        failed,
        items_processed: processed,
        total_items: total,
    });
}

/// Bounded-retry locate. Returns false on exhaustion or cancellation.
async fn locate_input(
    page: &dyn SearchPage,
    settings: &DriverSettings,
    cancel: &CancelToken,
) -> bool {
    for attempt in 1..=settings.locate_retry_max {
        if cancel.is_cancelled() {
            return false;
        }
        if page.locate_search_input().await {
            pilot_debug!("Search input located on attempt {attempt}");
            return true;
        }
        if pause(settings.locate_retry_delay, cancel).await.is_err() {
            return false;
        }
    }
    false
}

/// One item: type, wait for the page to settle, verify the result, commit.
/// `Ok(Err(reason))` is a per-item failure that must not abort the run.
async fn process_one(
    page: &dyn SearchPage,
    key: &str,
    settings: &DriverSettings,
    cancel: &CancelToken,
) -> Result<Result<(), String>, Cancelled> {
    pause(settings.after_typing_wait, cancel).await?;

    if let Err(err) = page.set_input_value(key).await {
        return Ok(Err(err.to_string()));
    }
    for c in key.chars() {
        pause(settings.typing_delay, cancel).await?;
        if let Err(err) = page.send_key(Key::Char(c)).await {
            return Ok(Err(err.to_string()));
        }
    }

    pause(settings.after_typing_wait, cancel).await?;

    if !wait_loading_cleared(page, settings, cancel).await? {
        return Ok(Err(format!(
            "loading indicator did not disappear within {:?}",
            settings.loading_timeout
        )));
    }

    if !wait_for_result(page, key, settings, cancel).await? {
        return Ok(Err("no matching search result appeared".to_string()));
    }

    pause(settings.before_enter_wait, cancel).await?;
    if let Err(err) = page.send_key(Key::Enter).await {
        return Ok(Err(err.to_string()));
    }
    pause(settings.after_enter_wait, cancel).await?;
    if let Err(err) = page.clear_input().await {
        return Ok(Err(err.to_string()));
    }
    pause(settings.after_clear_wait, cancel).await?;

    Ok(Ok(()))
}

async fn wait_loading_cleared(
    page: &dyn SearchPage,
    settings: &DriverSettings,
    cancel: &CancelToken,
) -> Result<bool, Cancelled> {
    let started = Instant::now();
    loop {
        if page.loading_indicator_cleared().await {
            return Ok(true);
        }
        if started.elapsed() >= settings.loading_timeout {
            return Ok(false);
        }
        pause(settings.loading_poll_interval, cancel).await?;
    }
}

async fn wait_for_result(
    page: &dyn SearchPage,
    key: &str,
    settings: &DriverSettings,
    cancel: &CancelToken,
) -> Result<bool, Cancelled> {
    let started = Instant::now();
    loop {
        let rows = page.visible_results().await;
        if rows.iter().any(|row| matches_expected_result(key, row)) {
            return Ok(true);
        }
        if started.elapsed() >= settings.result_timeout {
            return Ok(false);
        }
        pause(settings.result_poll_interval, cancel).await?;
    }
}
