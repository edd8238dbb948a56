//! Gate for image-analysis requests.
//!
//! At most one analysis runs at a time, and only for the draft that is
//! currently open. Opening another draft or closing the current one aborts
//! the in-flight task; a result that still arrives for a draft that is no
//! longer current is dropped instead of being merged into the wrong form.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::{AbortHandle, JoinHandle};

#[derive(Default)]
struct Slot {
    draft_id: Option<String>,
    generation: u64,
    in_flight: Option<AbortHandle>,
}

impl Slot {
    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Tracks the open draft and its pending analysis.
#[derive(Clone, Default)]
pub struct AnalysisTracker {
    slot: Arc<Mutex<Slot>>,
}

impl AnalysisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking holder cannot leave the slot inconsistent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks `draft_id` as the open draft, cancelling any analysis for another one.
    pub fn open(&self, draft_id: &str) {
        let mut slot = self.lock();
        if slot.draft_id.as_deref() == Some(draft_id) {
            return;
        }
        slot.abort_in_flight();
        slot.generation += 1;
        slot.draft_id = Some(draft_id.to_string());
    }

    /// Closes the open draft and cancels its analysis.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.abort_in_flight();
        slot.generation += 1;
        slot.draft_id = None;
    }

    pub fn current(&self) -> Option<String> {
        self.lock().draft_id.clone()
    }

    /// Runs `analysis` for the open draft.
    ///
    /// Returns `None` when no draft is open. The handle resolves to `None`
    /// when the draft changed before the analysis finished, and to a
    /// cancellation error when the task was aborted.
    pub fn spawn<F, T>(&self, analysis: F) -> Option<JoinHandle<Option<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut slot = self.lock();
        let draft_id = slot.draft_id.clone()?;
        slot.abort_in_flight();
        let generation = slot.generation;

        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            let result = analysis.await;
            if tracker.is_current(&draft_id, generation) {
                tracker.lock().in_flight = None;
                Some(result)
            } else {
                tracing::debug!(draft_id = %draft_id, "Discarding analysis result for a closed draft");
                None
            }
        });
        slot.in_flight = Some(handle.abort_handle());
        Some(handle)
    }

    fn is_current(&self, draft_id: &str, generation: u64) -> bool {
        let slot = self.lock();
        slot.generation == generation && slot.draft_id.as_deref() == Some(draft_id)
    }
}
