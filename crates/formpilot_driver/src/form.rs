use formpilot_core::{parse_form_line, WorkItem};
use pilot_logging::{pilot_info, pilot_warn};

use crate::cancel::pause;
use crate::{CancelToken, DriverEvent, DriverSettings, EntryFormPage, EventSink, StateStore};

/// One driver invocation of the reload-driven workflow: process the head of
/// the persisted queue, submit, and let the navigation destroy this instance.
/// The controller re-enters the loop after each reload until the queue is
/// empty.
///
/// Invalid or unfillable records are recorded as failed and skipped in place
/// (no submit happened, so the page is still alive and the next record can be
/// tried within the same lifetime). The item hand-off is made durable by
/// popping it from the store immediately before the submit that reloads the
/// page: a reload that goes wrong cannot process an item twice, at the
/// accepted cost of losing the item if the submit itself fails to land.
pub async fn run_form_step(
    page: &dyn EntryFormPage,
    settings: &DriverSettings,
    cancel: &CancelToken,
    store: &dyn StateStore,
    sink: &dyn EventSink,
) {
    loop {
        let mut stored = match store.load() {
            Ok(stored) => stored,
            Err(err) => {
                sink.emit(DriverEvent::InitFailed {
                    reason: format!("shared store unreadable: {err}"),
                });
                return;
            }
        };
        let total = stored.job_total;

        if cancel.is_cancelled() {
            sink.emit(DriverEvent::Stopped {
                items_processed: stored.items_processed(),
                total_items: total,
            });
            return;
        }

        let Some(head) = stored.pending_work_items.first().cloned() else {
            pilot_info!("Work queue empty, automation finished");
            let failed = stored.last_failed_items.clone();
            stored.pending_items_timestamp = None;
            if let Err(err) = store.save(&stored) {
                pilot_warn!("Could not clear pending-items timestamp: {err}");
            }
            sink.emit(DriverEvent::Finished {
                failed,
                items_processed: stored.items_processed(),
                total_items: total,
            });
            return;
        };

        let (value, field, expected_impact) = match parse_form_line(&head) {
            Ok(WorkItem::FormEntry {
                value,
                field,
                expected_impact,
            }) => (value, field, expected_impact),
            Ok(WorkItem::Search(_)) => {
                skip_failed(store, &mut stored, head, "not a form record", sink);
                continue;
            }
            Err(reason) => {
                skip_failed(store, &mut stored, head, &reason, sink);
                continue;
            }
        };

        sink.emit(DriverEvent::Progress {
            status: format!("Processing: {value}"),
            items_processed: stored.items_processed() + 1,
            total_items: total,
        });

        if let Err(err) = page.fill_field(field, &value).await {
            skip_failed(store, &mut stored, head, &err.to_string(), sink);
            continue;
        }
        match page.select_expected_impact(&expected_impact).await {
            Ok(true) => {}
            Ok(false) => {
                let reason =
                    format!("option '{expected_impact}' not found in expected-impact dropdown");
                skip_failed(store, &mut stored, head, &reason, sink);
                continue;
            }
            Err(err) => {
                skip_failed(store, &mut stored, head, &err.to_string(), sink);
                continue;
            }
        }

        if pause(settings.before_submit_wait, cancel).await.is_err() {
            sink.emit(DriverEvent::Stopped {
                items_processed: stored.items_processed(),
                total_items: total,
            });
            return;
        }

        // Durable hand-off: drop the item from the queue before the click
        // that tears this page down.
        stored.pending_work_items.remove(0);
        if let Err(err) = store.save(&stored) {
            // Submitting without the pop risks processing the item twice
            // after the reload, so halt here and let the operator restart.
            pilot_warn!("Could not update work queue before submit: {err}");
            sink.emit(DriverEvent::Progress {
                status: format!("Failed to update work queue: {err}; automation halted"),
                items_processed: stored.items_processed(),
                total_items: total,
            });
            return;
        }

        if let Err(err) = page.submit_save_and_new().await {
            pilot_warn!("Submit failed for '{value}': {err}");
            stored.last_failed_items.push(head);
            if let Err(err) = store.save(&stored) {
                pilot_warn!("Could not record failed item: {err}");
            }
            // No navigation happened; keep going with the next record.
            continue;
        }

        pilot_info!(
            "Submitted '{value}', {} items remaining",
            stored.pending_work_items.len()
        );
        sink.emit(DriverEvent::AwaitingReload {
            remaining: stored.pending_work_items.len() as u32,
        });
        return;
    }
}

/// Records a per-item failure, pops the item, and reports the skip.
fn skip_failed(
    store: &dyn StateStore,
    stored: &mut crate::StoredState,
    head: String,
    reason: &str,
    sink: &dyn EventSink,
) {
    pilot_warn!("Skipping item '{head}': {reason}");
    stored.pending_work_items.remove(0);
    stored.last_failed_items.push(head.clone());
    if let Err(err) = store.save(stored) {
        pilot_warn!("Could not record failed item '{head}': {err}");
    }
    sink.emit(DriverEvent::Progress {
        status: format!("Skipped item '{head}': {reason}"),
        items_processed: stored.items_processed(),
        total_items: stored.job_total,
    });
}
