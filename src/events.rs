//! Messages exchanged with the presentation layer.

use crate::chapters::{Chapter, ScanProgress};
use crate::document::DocumentMode;
use crate::search::SearchBatch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ReaderCommand {
    ScrollUp,
    ScrollDown,
    #[serde(rename_all = "camelCase")]
    JumpToLine { line: i64 },
    #[serde(rename_all = "camelCase")]
    JumpToChapter { index: usize },
    #[serde(rename_all = "camelCase")]
    JumpToMatch { index: usize },
    #[serde(rename_all = "camelCase")]
    Search { term: String },
    #[serde(rename_all = "camelCase")]
    RequestChapters {
        #[serde(default)]
        rescan: bool,
    },
    #[serde(rename_all = "camelCase")]
    SetChapterPattern { pattern: String },
    #[serde(rename_all = "camelCase")]
    ReportProgress { line: i64 },
    #[serde(rename_all = "camelCase")]
    RequestWindow { start: i64, end: i64 },
    RequestInitialContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReaderEvent {
    #[serde(rename_all = "camelCase")]
    InitialContent {
        mode: DocumentMode,
        start_line: usize,
        lines: Vec<String>,
        total_lines: usize,
        current_line: usize,
    },
    #[serde(rename_all = "camelCase")]
    ChunkUpdate {
        start_line: usize,
        end_line: usize,
        lines: Vec<String>,
        total_lines: usize,
        jump: bool,
        target_line: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    ScrollUpdate { target_line: usize },
    ChaptersUpdate { chapters: Vec<Chapter> },
    ScanProgress(ScanProgress),
    ScanComplete { chapters: Vec<Chapter> },
    ScanFailed { error: String },
    SearchResults(SearchBatch),
    SearchFailed { error: String },
    Warning { message: String },
}

/// Signed line numbers from the host are clamped at zero.
pub fn clamp_line(line: i64) -> usize {
    usize::try_from(line.max(0)).unwrap_or(usize::MAX)
}
