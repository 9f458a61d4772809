use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the driver loop and whoever
/// requested the stop. The loop checks it at every suspension point; there is
/// no forced preemption.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A work loop observed the stop flag; unwinds out of the current item.
pub(crate) struct Cancelled;

/// Time-bounded sleep with a cancellation check on both sides, so every
/// suspension point in the loops honors the stop flag.
pub(crate) async fn pause(
    duration: std::time::Duration,
    cancel: &CancelToken,
) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    Ok(())
}
