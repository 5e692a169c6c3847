//! Background suggestion computation.
//!
//! A single-slot worker: at most one suggestion build runs at a time,
//! and at most one finished table waits to be collected. A new request
//! while a build is running is refused; the caller cancels the stale
//! build first and retries. This matches an interactive console where
//! only the latest cursor position matters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use crate::api::EngineOptions;
use crate::host::HostModel;
use crate::symbols::SymbolTable;

use super::SuggestionTable;

pub struct SuggestWorker {
    table: Arc<SymbolTable>,
    host: Arc<dyn HostModel>,
    opts: EngineOptions,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    slot: Arc<Mutex<Option<SuggestionTable>>>,
}

impl SuggestWorker {
    pub fn new(table: Arc<SymbolTable>, host: Arc<dyn HostModel>, opts: EngineOptions) -> Self {
        Self {
            table,
            host,
            opts,
            busy: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Start computing suggestions for `source` at `cursor`. Returns
    /// false when a build is already running; cancel it and retry.
    pub fn request(&self, source: String, cursor: usize) -> bool {
        self.request_with(source, cursor, |_| {})
    }

    /// Like [`Self::request`], additionally invoking `on_done` on the
    /// worker thread right before the table becomes pollable. Cancelled
    /// builds never reach the callback.
    pub fn request_with(
        &self,
        source: String,
        cursor: usize,
        on_done: impl FnOnce(&SuggestionTable) + Send + 'static,
    ) -> bool {
        if self.busy.swap(true, Ordering::AcqRel) {
            warn!("suggestion request refused: worker busy");
            return false;
        }
        self.cancel.store(false, Ordering::Release);

        let table = Arc::clone(&self.table);
        let host = Arc::clone(&self.host);
        let opts = self.opts.clone();
        let busy = Arc::clone(&self.busy);
        let cancel = Arc::clone(&self.cancel);
        let slot = Arc::clone(&self.slot);

        thread::spawn(move || {
            let result = super::build(&source, cursor, &table, host.as_ref(), &opts, || {
                cancel.load(Ordering::Acquire)
            });
            if cancel.load(Ordering::Acquire) {
                debug!("suggestion build cancelled");
            } else {
                on_done(&result);
                *slot.lock().expect("suggestion slot poisoned") = Some(result);
            }
            busy.store(false, Ordering::Release);
        });
        true
    }

    /// Ask the running build (if any) to stop; its result is discarded.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Collect the finished table, if one is waiting.
    pub fn poll(&self) -> Option<SuggestionTable> {
        self.slot.lock().expect("suggestion slot poisoned").take()
    }
}
