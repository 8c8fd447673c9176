//! One reading session per open document.
//!
//! The session owns every piece of per-document state. Window reads in
//! windowed mode go to a worker thread that owns the [`WindowCache`]; chapter
//! scans and searches run on their own threads with their own file streams.
//! Every request carries an id and responses for superseded ids are dropped
//! when the session polls its channels.

use crate::chapters::{self, Chapter, ChapterScan, ScanEvent, ScanProgress};
use crate::config::ReaderConfig;
use crate::decoder::TextEncoding;
use crate::document::{self, DocumentContent, DocumentMode};
use crate::error::{ReaderError, Result};
use crate::events::{clamp_line, ReaderCommand, ReaderEvent};
use crate::progress::{ProgressTracker, StorePositionWriter};
use crate::search::{self, SearchBatch, SearchEvent, SearchMatch, SearchQuery, SearchScan};
use crate::store::DocumentStore;
use crate::window_cache::{clamp_range, WindowCache};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
enum WindowPurpose {
    Initial { current_line: usize },
    Chunk { jump: bool, target_line: Option<usize> },
}

struct WindowRequest {
    request_id: u64,
    start: usize,
    end: usize,
    purpose: WindowPurpose,
}

struct WindowResponse {
    request_id: u64,
    start: usize,
    end: usize,
    lines: Vec<String>,
    total_lines: usize,
    purpose: WindowPurpose,
    warning: Option<String>,
}

enum ChapterResponse {
    Progress {
        request_id: u64,
        progress: ScanProgress,
    },
    Complete {
        request_id: u64,
        chapters: Vec<Chapter>,
    },
    Failed {
        request_id: u64,
        error: String,
    },
}

enum SearchResponse {
    Batch {
        request_id: u64,
        batch: SearchBatch,
    },
    Complete {
        request_id: u64,
        batch: SearchBatch,
        matches: Vec<SearchMatch>,
    },
    Failed {
        request_id: u64,
        error: String,
    },
}

/// Cancel flag shared with a background scan or search.
struct TaskHandle {
    cancel: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn spawn_window_worker(mut cache: WindowCache) -> (Sender<WindowRequest>, Receiver<WindowResponse>) {
    let (tx_req, rx_req) = mpsc::channel::<WindowRequest>();
    let (tx_res, rx_res) = mpsc::channel::<WindowResponse>();

    thread::spawn(move || {
        while let Ok(mut req) = rx_req.recv() {
            while let Ok(newer) = rx_req.try_recv() {
                req = newer;
            }
            let (lines, warning) = match cache.try_get_range(req.start, req.end) {
                Ok(lines) => (lines, None),
                Err(err) => {
                    tracing::warn!(start = req.start, end = req.end, "window read failed: {err}");
                    (
                        Vec::new(),
                        Some(format!("failed to load lines {}-{}: {err}", req.start, req.end)),
                    )
                }
            };
            let end = if lines.is_empty() {
                req.end
            } else {
                req.start + lines.len() - 1
            };
            if tx_res
                .send(WindowResponse {
                    request_id: req.request_id,
                    start: req.start,
                    end,
                    lines,
                    total_lines: cache.total_lines(),
                    purpose: req.purpose,
                    warning,
                })
                .is_err()
            {
                break;
            }
        }
        tracing::debug!("window worker stopped");
    });

    (tx_req, rx_res)
}

struct ChapterTask {
    request_id: u64,
    path: PathBuf,
    encoding: TextEncoding,
    pattern: Regex,
    total: usize,
    chunk_bytes: usize,
    interval: usize,
}

fn spawn_chapter_task(task: ChapterTask, tx: Sender<ChapterResponse>, cancel: Arc<AtomicBool>) {
    thread::spawn(move || {
        let request_id = task.request_id;
        let scan = match ChapterScan::open(
            &task.path,
            task.encoding,
            task.pattern,
            task.total,
            task.chunk_bytes,
        ) {
            Ok(scan) => scan.with_interval(task.interval).with_cancel(cancel),
            Err(err) => {
                let _ = tx.send(ChapterResponse::Failed {
                    request_id,
                    error: err.to_string(),
                });
                return;
            }
        };
        for event in scan {
            let msg = match event {
                Ok(ScanEvent::Progress(progress)) => ChapterResponse::Progress {
                    request_id,
                    progress,
                },
                Ok(ScanEvent::Complete(chapters)) => ChapterResponse::Complete {
                    request_id,
                    chapters,
                },
                Err(err) if err.is_cancelled() => {
                    tracing::debug!(request_id, "chapter scan cancelled");
                    return;
                }
                Err(err) => ChapterResponse::Failed {
                    request_id,
                    error: err.to_string(),
                },
            };
            if tx.send(msg).is_err() {
                return;
            }
        }
    });
}

struct SearchTask {
    request_id: u64,
    path: PathBuf,
    encoding: TextEncoding,
    query: SearchQuery,
    total: usize,
    chunk_bytes: usize,
}

fn spawn_search_task(task: SearchTask, tx: Sender<SearchResponse>, cancel: Arc<AtomicBool>) {
    thread::spawn(move || {
        let request_id = task.request_id;
        let scan = match SearchScan::open(
            &task.path,
            task.encoding,
            task.query,
            task.total,
            task.chunk_bytes,
        ) {
            Ok(scan) => scan.with_cancel(cancel),
            Err(err) => {
                let _ = tx.send(SearchResponse::Failed {
                    request_id,
                    error: err.to_string(),
                });
                return;
            }
        };
        for event in scan {
            let msg = match event {
                Ok(SearchEvent::Batch(batch)) => SearchResponse::Batch { request_id, batch },
                Ok(SearchEvent::Complete { batch, matches }) => SearchResponse::Complete {
                    request_id,
                    batch,
                    matches,
                },
                Err(err) if err.is_cancelled() => {
                    tracing::debug!(request_id, "search cancelled");
                    return;
                }
                Err(err) => SearchResponse::Failed {
                    request_id,
                    error: err.to_string(),
                },
            };
            if tx.send(msg).is_err() {
                return;
            }
        }
    });
}

enum Backend {
    Materialized(Arc<Vec<String>>),
    Windowed {
        window_tx: Sender<WindowRequest>,
        window_rx: Receiver<WindowResponse>,
    },
}

pub struct ReaderSession {
    config: ReaderConfig,
    store: DocumentStore,
    path: PathBuf,
    encoding: TextEncoding,
    total_lines: usize,
    backend: Backend,
    current_line: usize,
    loaded_window: Option<(usize, usize)>,
    requested_window: Option<(usize, usize)>,
    chapter_pattern: String,
    chapters: Option<Vec<Chapter>>,
    search_matches: Vec<SearchMatch>,
    next_request_id: u64,
    pending_window_request_id: Option<u64>,
    pending_chapter_request_id: Option<u64>,
    pending_search_request_id: Option<u64>,
    chapter_task: Option<TaskHandle>,
    search_task: Option<TaskHandle>,
    chapter_tx: Sender<ChapterResponse>,
    chapter_rx: Receiver<ChapterResponse>,
    search_tx: Sender<SearchResponse>,
    search_rx: Receiver<SearchResponse>,
    outbox: VecDeque<ReaderEvent>,
    tracker: Option<ProgressTracker>,
}

impl ReaderSession {
    /// Opens `path`, restoring the stored position and chapter pattern.
    pub fn open(path: &Path, config: ReaderConfig, store: DocumentStore) -> Result<Self> {
        let config = config.normalized();
        let document = document::open(path, &config)?;
        let record = store.load(path);
        let total_lines = document.total_lines;
        let current_line = record
            .position
            .map(|line| line.min(total_lines.saturating_sub(1)))
            .unwrap_or(0);
        let chapter_pattern = record
            .chapter_pattern
            .unwrap_or_else(|| config.default_chapter_pattern.clone());

        let backend = match document.content {
            DocumentContent::Materialized(lines) => Backend::Materialized(lines),
            DocumentContent::Windowed(cache) => {
                let (window_tx, window_rx) = spawn_window_worker(cache);
                Backend::Windowed {
                    window_tx,
                    window_rx,
                }
            }
        };

        let tracker = ProgressTracker::spawn(
            StorePositionWriter::new(store.clone(), path, total_lines),
            config.progress_debounce(),
        );
        let (chapter_tx, chapter_rx) = mpsc::channel();
        let (search_tx, search_rx) = mpsc::channel();

        tracing::debug!(
            path = %path.display(),
            current_line,
            pattern = %chapter_pattern,
            "session opened"
        );
        Ok(Self {
            config,
            store,
            path: path.to_path_buf(),
            encoding: document.encoding,
            total_lines,
            backend,
            current_line,
            loaded_window: None,
            requested_window: None,
            chapter_pattern,
            chapters: None,
            search_matches: Vec::new(),
            next_request_id: 1,
            pending_window_request_id: None,
            pending_chapter_request_id: None,
            pending_search_request_id: None,
            chapter_task: None,
            search_task: None,
            chapter_tx,
            chapter_rx,
            search_tx,
            search_rx,
            outbox: VecDeque::new(),
            tracker: Some(tracker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> DocumentMode {
        match self.backend {
            Backend::Materialized(_) => DocumentMode::Materialized,
            Backend::Windowed { .. } => DocumentMode::Windowed,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn chapter_pattern(&self) -> &str {
        &self.chapter_pattern
    }

    /// Chapters from the last completed scan, if any.
    pub fn chapters(&self) -> Option<&[Chapter]> {
        self.chapters.as_deref()
    }

    pub fn search_matches(&self) -> &[SearchMatch] {
        &self.search_matches
    }

    pub fn handle(&mut self, command: ReaderCommand) -> Result<()> {
        tracing::trace!(?command, "handling command");
        match command {
            ReaderCommand::ScrollUp => self.scroll_up(),
            ReaderCommand::ScrollDown => self.scroll_down(),
            ReaderCommand::JumpToLine { line } => self.jump_to_line(clamp_line(line)),
            ReaderCommand::JumpToChapter { index } => return self.jump_to_chapter(index),
            ReaderCommand::JumpToMatch { index } => return self.jump_to_match(index),
            ReaderCommand::Search { term } => return self.search(&term),
            ReaderCommand::RequestChapters { rescan } => self.request_chapters(rescan),
            ReaderCommand::SetChapterPattern { pattern } => {
                return self.set_chapter_pattern(&pattern)
            }
            ReaderCommand::ReportProgress { line } => self.report_progress(clamp_line(line)),
            ReaderCommand::RequestWindow { start, end } => {
                self.request_window(clamp_line(start), clamp_line(end))
            }
            ReaderCommand::RequestInitialContent => self.request_initial_content(),
        }
        Ok(())
    }

    pub fn request_initial_content(&mut self) {
        match &self.backend {
            Backend::Materialized(lines) => {
                self.outbox.push_back(ReaderEvent::InitialContent {
                    mode: DocumentMode::Materialized,
                    start_line: 0,
                    lines: lines.as_ref().clone(),
                    total_lines: self.total_lines,
                    current_line: self.current_line,
                });
            }
            Backend::Windowed { .. } => {
                let (start, end) = self.window_around(self.current_line);
                self.send_window_request(
                    start,
                    end,
                    WindowPurpose::Initial {
                        current_line: self.current_line,
                    },
                );
            }
        }
    }

    pub fn request_window(&mut self, start: usize, end: usize) {
        match &self.backend {
            Backend::Materialized(lines) => {
                let lines = document::slice_lines(lines.as_slice(), start, end);
                let end = if lines.is_empty() {
                    end
                } else {
                    start + lines.len() - 1
                };
                self.outbox.push_back(ReaderEvent::ChunkUpdate {
                    start_line: start,
                    end_line: end,
                    lines,
                    total_lines: self.total_lines,
                    jump: false,
                    target_line: None,
                });
            }
            Backend::Windowed { .. } => {
                self.send_window_request(
                    start,
                    end,
                    WindowPurpose::Chunk {
                        jump: false,
                        target_line: None,
                    },
                );
            }
        }
    }

    pub fn scroll_up(&mut self) {
        let target = self.current_line.saturating_sub(self.config.scroll_step);
        self.scroll_to(target);
    }

    pub fn scroll_down(&mut self) {
        let target = self
            .current_line
            .saturating_add(self.config.scroll_step)
            .min(self.last_line());
        self.scroll_to(target);
    }

    fn scroll_to(&mut self, target: usize) {
        self.set_position(target);
        self.outbox
            .push_back(ReaderEvent::ScrollUpdate { target_line: target });
        if matches!(self.backend, Backend::Windowed { .. }) && self.near_window_edge(target) {
            let (start, end) = self.window_around(target);
            self.send_window_request(
                start,
                end,
                WindowPurpose::Chunk {
                    jump: false,
                    target_line: None,
                },
            );
        }
    }

    pub fn jump_to_line(&mut self, line: usize) {
        let target = line.min(self.last_line());
        self.set_position(target);
        if matches!(self.backend, Backend::Materialized(_)) {
            self.outbox
                .push_back(ReaderEvent::ScrollUpdate { target_line: target });
            return;
        }
        let (start, end) = self.window_around(target);
        if self.window_loaded(start, end) {
            self.outbox
                .push_back(ReaderEvent::ScrollUpdate { target_line: target });
            return;
        }
        self.send_window_request(
            start,
            end,
            WindowPurpose::Chunk {
                jump: true,
                target_line: Some(target),
            },
        );
    }

    pub fn jump_to_chapter(&mut self, index: usize) -> Result<()> {
        let line = self
            .chapters
            .as_ref()
            .and_then(|chapters| chapters.get(index))
            .map(|chapter| chapter.line)
            .ok_or(ReaderError::UnknownChapter(index))?;
        self.jump_to_line(line);
        Ok(())
    }

    pub fn jump_to_match(&mut self, index: usize) -> Result<()> {
        let line = self
            .search_matches
            .get(index)
            .map(|m| m.line)
            .ok_or(ReaderError::UnknownMatch(index))?;
        self.jump_to_line(line);
        Ok(())
    }

    pub fn report_progress(&mut self, line: usize) {
        self.set_position(line.min(self.last_line()));
    }

    /// Returns cached chapters unless `rescan` is set or no scan has finished.
    pub fn request_chapters(&mut self, rescan: bool) {
        if !rescan {
            if let Some(chapters) = &self.chapters {
                self.outbox.push_back(ReaderEvent::ChaptersUpdate {
                    chapters: chapters.clone(),
                });
                return;
            }
        }
        if let Err(err) = self.start_chapter_scan() {
            self.outbox.push_back(ReaderEvent::ScanFailed {
                error: err.to_string(),
            });
        }
    }

    /// Validates and stores a document-specific pattern, then rescans.
    /// An invalid pattern leaves the previous pattern and chapters in place.
    pub fn set_chapter_pattern(&mut self, pattern: &str) -> Result<()> {
        if let Err(err) = chapters::compile_pattern(pattern) {
            self.outbox.push_back(ReaderEvent::ScanFailed {
                error: err.to_string(),
            });
            return Err(err);
        }
        let stored = pattern.to_string();
        self.store
            .update(&self.path, |record| record.chapter_pattern = Some(stored))?;
        self.chapter_pattern = pattern.to_string();
        self.request_chapters(true);
        Ok(())
    }

    pub fn search(&mut self, term: &str) -> Result<()> {
        let query = SearchQuery::new(term)?;
        if let Some(task) = self.search_task.take() {
            task.cancel();
        }
        self.search_matches.clear();
        match &self.backend {
            Backend::Materialized(lines) => {
                self.pending_search_request_id = None;
                let (batch, matches) = search::search_lines(lines.as_slice(), &query);
                self.search_matches = matches;
                self.outbox.push_back(ReaderEvent::SearchResults(batch));
            }
            Backend::Windowed { .. } => {
                let request_id = self.next_request_id();
                self.pending_search_request_id = Some(request_id);
                let handle = TaskHandle::new();
                spawn_search_task(
                    SearchTask {
                        request_id,
                        path: self.path.clone(),
                        encoding: self.encoding,
                        query,
                        total: self.total_lines,
                        chunk_bytes: self.config.read_chunk_bytes,
                    },
                    self.search_tx.clone(),
                    Arc::clone(&handle.cancel),
                );
                self.search_task = Some(handle);
            }
        }
        Ok(())
    }

    fn start_chapter_scan(&mut self) -> Result<()> {
        let pattern = chapters::compile_pattern(&self.chapter_pattern)?;
        if let Some(task) = self.chapter_task.take() {
            task.cancel();
        }
        match &self.backend {
            Backend::Materialized(lines) => {
                self.pending_chapter_request_id = None;
                let found = chapters::scan_lines(lines.as_slice(), &pattern);
                tracing::debug!(chapters = found.len(), "chapter scan finished");
                self.outbox.push_back(ReaderEvent::ScanComplete {
                    chapters: found.clone(),
                });
                self.chapters = Some(found);
            }
            Backend::Windowed { .. } => {
                let request_id = self.next_request_id();
                self.pending_chapter_request_id = Some(request_id);
                let handle = TaskHandle::new();
                spawn_chapter_task(
                    ChapterTask {
                        request_id,
                        path: self.path.clone(),
                        encoding: self.encoding,
                        pattern,
                        total: self.total_lines,
                        chunk_bytes: self.config.read_chunk_bytes,
                        interval: self.config.scan_progress_interval,
                    },
                    self.chapter_tx.clone(),
                    Arc::clone(&handle.cancel),
                );
                self.chapter_task = Some(handle);
            }
        }
        Ok(())
    }

    /// Drains worker responses and returns every pending event in order.
    pub fn poll_events(&mut self) -> Vec<ReaderEvent> {
        self.poll_window_response();
        self.poll_chapter_response();
        self.poll_search_response();
        self.outbox.drain(..).collect()
    }

    /// Polls until an event satisfies `done` or `timeout` passes. Returns
    /// every event seen, the matching one last.
    pub fn wait_for(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&ReaderEvent) -> bool,
    ) -> Vec<ReaderEvent> {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        loop {
            let mut events = self.poll_events().into_iter();
            while let Some(event) = events.next() {
                let matched = done(&event);
                seen.push(event);
                if matched {
                    self.outbox.extend(events);
                    return seen;
                }
            }
            if Instant::now() >= deadline {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Cancels background work and persists the reading position.
    pub fn close(&mut self) {
        self.cancel_tasks();
        if let Some(tracker) = &self.tracker {
            tracker.flush_now();
        }
    }

    /// Writes the pending reading position without closing.
    pub fn flush_progress(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.flush_now();
        }
    }

    fn cancel_tasks(&mut self) {
        if let Some(task) = self.chapter_task.take() {
            task.cancel();
        }
        if let Some(task) = self.search_task.take() {
            task.cancel();
        }
        self.pending_chapter_request_id = None;
        self.pending_search_request_id = None;
    }

    fn poll_window_response(&mut self) {
        let Backend::Windowed { window_rx, .. } = &self.backend else {
            return;
        };
        let responses: Vec<WindowResponse> = window_rx.try_iter().collect();
        for response in responses {
            if Some(response.request_id) != self.pending_window_request_id {
                continue;
            }
            self.pending_window_request_id = None;
            self.requested_window = None;
            if response.total_lines != self.total_lines {
                tracing::info!(
                    before = self.total_lines,
                    after = response.total_lines,
                    "document line count changed"
                );
                self.total_lines = response.total_lines;
                self.current_line = self.current_line.min(self.last_line());
            }
            if let Some(message) = response.warning {
                self.outbox.push_back(ReaderEvent::Warning { message });
            }
            self.loaded_window = if response.lines.is_empty() {
                None
            } else {
                Some((response.start, response.end))
            };
            let event = match response.purpose {
                WindowPurpose::Initial { current_line } => ReaderEvent::InitialContent {
                    mode: DocumentMode::Windowed,
                    start_line: response.start,
                    lines: response.lines,
                    total_lines: response.total_lines,
                    current_line: current_line.min(self.last_line()),
                },
                WindowPurpose::Chunk { jump, target_line } => ReaderEvent::ChunkUpdate {
                    start_line: response.start,
                    end_line: response.end,
                    lines: response.lines,
                    total_lines: response.total_lines,
                    jump,
                    target_line,
                },
            };
            self.outbox.push_back(event);
        }
    }

    fn poll_chapter_response(&mut self) {
        while let Ok(msg) = self.chapter_rx.try_recv() {
            match msg {
                ChapterResponse::Progress {
                    request_id,
                    progress,
                } => {
                    if Some(request_id) != self.pending_chapter_request_id {
                        continue;
                    }
                    self.outbox.push_back(ReaderEvent::ScanProgress(progress));
                }
                ChapterResponse::Complete {
                    request_id,
                    chapters,
                } => {
                    if Some(request_id) != self.pending_chapter_request_id {
                        continue;
                    }
                    self.pending_chapter_request_id = None;
                    self.chapter_task = None;
                    tracing::debug!(chapters = chapters.len(), "chapter scan finished");
                    self.outbox.push_back(ReaderEvent::ScanComplete {
                        chapters: chapters.clone(),
                    });
                    self.chapters = Some(chapters);
                }
                ChapterResponse::Failed { request_id, error } => {
                    if Some(request_id) != self.pending_chapter_request_id {
                        continue;
                    }
                    self.pending_chapter_request_id = None;
                    self.chapter_task = None;
                    tracing::warn!("chapter scan failed: {error}");
                    self.outbox.push_back(ReaderEvent::ScanFailed { error });
                }
            }
        }
    }

    fn poll_search_response(&mut self) {
        while let Ok(msg) = self.search_rx.try_recv() {
            match msg {
                SearchResponse::Batch { request_id, batch } => {
                    if Some(request_id) != self.pending_search_request_id {
                        continue;
                    }
                    self.outbox.push_back(ReaderEvent::SearchResults(batch));
                }
                SearchResponse::Complete {
                    request_id,
                    batch,
                    matches,
                } => {
                    if Some(request_id) != self.pending_search_request_id {
                        continue;
                    }
                    self.pending_search_request_id = None;
                    self.search_task = None;
                    self.search_matches = matches;
                    self.outbox.push_back(ReaderEvent::SearchResults(batch));
                }
                SearchResponse::Failed { request_id, error } => {
                    if Some(request_id) != self.pending_search_request_id {
                        continue;
                    }
                    self.pending_search_request_id = None;
                    self.search_task = None;
                    tracing::warn!("search failed: {error}");
                    self.outbox.push_back(ReaderEvent::SearchFailed { error });
                }
            }
        }
    }

    fn send_window_request(&mut self, start: usize, end: usize, purpose: WindowPurpose) {
        let request_id = self.next_request_id();
        let Backend::Windowed { window_tx, .. } = &self.backend else {
            return;
        };
        let req = WindowRequest {
            request_id,
            start,
            end,
            purpose,
        };
        if window_tx.send(req).is_err() {
            self.pending_window_request_id = None;
            self.requested_window = None;
            self.outbox.push_back(ReaderEvent::Warning {
                message: "window worker is unavailable".to_string(),
            });
            return;
        }
        self.pending_window_request_id = Some(request_id);
        self.requested_window = Some((start, end));
    }

    fn next_request_id(&mut self) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1);
        request_id
    }

    fn set_position(&mut self, line: usize) {
        self.current_line = line;
        if let Some(tracker) = &self.tracker {
            tracker.update(line);
        }
    }

    fn last_line(&self) -> usize {
        self.total_lines.saturating_sub(1)
    }

    /// `[t - bufferLines, t + chunkSize + bufferLines - 1]`, clamped.
    fn window_around(&self, target: usize) -> (usize, usize) {
        let start = target.saturating_sub(self.config.buffer_lines);
        let end = target
            .saturating_add(self.config.chunk_size)
            .saturating_add(self.config.buffer_lines)
            .saturating_sub(1);
        clamp_range(start, end, self.total_lines).unwrap_or((start, end))
    }

    fn window_loaded(&self, start: usize, end: usize) -> bool {
        matches!(self.loaded_window, Some((s, e)) if s <= start && end <= e)
    }

    /// True when `target` is within `bufferLines` of an edge of the window
    /// that is loaded or already requested, and that edge is not the
    /// document boundary.
    fn near_window_edge(&self, target: usize) -> bool {
        let Some((start, end)) = self.requested_window.or(self.loaded_window) else {
            return true;
        };
        let buffer = self.config.buffer_lines;
        let near_top = start > 0 && target < start.saturating_add(buffer);
        let near_bottom = end < self.last_line() && target.saturating_add(buffer) > end;
        near_top || near_bottom
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}
