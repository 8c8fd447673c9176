//! Debounced persistence of the reading position.
//!
//! A dedicated thread owns the pending value and the debounce deadline. Every
//! `update` restarts the deadline; the value is written when the deadline
//! passes, on `flush_now`, or when the tracker is dropped.

use crate::store::DocumentStore;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub trait PositionWriter: Send + 'static {
    fn write_position(&mut self, line: usize) -> crate::error::Result<()>;
}

/// Writes the position and current line count into the document record.
pub struct StorePositionWriter {
    store: DocumentStore,
    document: PathBuf,
    total_lines: usize,
}

impl StorePositionWriter {
    pub fn new(store: DocumentStore, document: &Path, total_lines: usize) -> Self {
        Self {
            store,
            document: document.to_path_buf(),
            total_lines,
        }
    }
}

impl PositionWriter for StorePositionWriter {
    fn write_position(&mut self, line: usize) -> crate::error::Result<()> {
        let total_lines = self.total_lines;
        self.store.update(&self.document, |record| {
            record.position = Some(line);
            record.total_lines = Some(total_lines);
        })?;
        Ok(())
    }
}

enum TrackerMessage {
    Update(usize),
    Flush(Sender<()>),
}

pub struct ProgressTracker {
    tx: Option<Sender<TrackerMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressTracker {
    pub fn spawn(writer: impl PositionWriter, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<TrackerMessage>();
        let mut writer = writer;
        let worker = thread::spawn(move || {
            let mut pending: Option<usize> = None;
            let mut deadline: Option<Instant> = None;
            loop {
                let msg = match deadline {
                    Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                        Ok(msg) => Some(msg),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    },
                    None => match rx.recv() {
                        Ok(msg) => Some(msg),
                        Err(_) => break,
                    },
                };
                match msg {
                    Some(TrackerMessage::Update(line)) => {
                        pending = Some(line);
                        deadline = Some(Instant::now() + debounce);
                    }
                    Some(TrackerMessage::Flush(ack)) => {
                        persist(&mut writer, &mut pending);
                        deadline = None;
                        let _ = ack.send(());
                    }
                    None => {
                        persist(&mut writer, &mut pending);
                        deadline = None;
                    }
                }
            }
            persist(&mut writer, &mut pending);
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn update(&self, line: usize) {
        if let Some(tx) = &self.tx {
            if tx.send(TrackerMessage::Update(line)).is_err() {
                tracing::warn!(line, "progress tracker is unavailable");
            }
        }
    }

    /// Writes any pending position before returning.
    pub fn flush_now(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(TrackerMessage::Flush(ack_tx)).is_err() {
            tracing::warn!("progress tracker is unavailable");
            return;
        }
        let _ = ack_rx.recv();
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn persist(writer: &mut impl PositionWriter, pending: &mut Option<usize>) {
    let Some(line) = pending.take() else {
        return;
    };
    match writer.write_position(line) {
        Ok(()) => tracing::debug!(line, "persisted reading position"),
        Err(err) => tracing::warn!(line, "failed to persist reading position: {err}"),
    }
}
