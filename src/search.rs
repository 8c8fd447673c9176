use crate::chapters::ScanProgress;
use crate::decoder::TextEncoding;
use crate::error::{ReaderError, Result};
use crate::lines::LineStream;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub const MAX_SEARCH_RESULTS: usize = 1000;
pub const BATCH_PREVIEW_LIMIT: usize = 100;
pub const BATCH_EVERY_MATCHES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBatch {
    pub term: String,
    pub matches: Vec<SearchMatch>,
    pub has_more: bool,
    pub total_matches: usize,
    pub progress: Option<ScanProgress>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Batch(SearchBatch),
    /// Final batch plus every accumulated match, for navigation.
    Complete {
        batch: SearchBatch,
        matches: Vec<SearchMatch>,
    },
}

/// A literal, case-sensitive search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
}

impl SearchQuery {
    pub fn new(term: &str) -> Result<Self> {
        if term.trim().is_empty() {
            return Err(ReaderError::EmptySearchTerm);
        }
        Ok(Self {
            term: term.to_string(),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.term)
    }
}

struct Accumulator {
    query: SearchQuery,
    matches: Vec<SearchMatch>,
}

impl Accumulator {
    fn new(query: SearchQuery) -> Self {
        Self {
            query,
            matches: Vec::new(),
        }
    }

    /// Returns true when the line was a match.
    fn offer(&mut self, index: usize, line: String) -> bool {
        if self.is_full() || !self.query.matches(&line) {
            return false;
        }
        self.push(index, line);
        true
    }

    fn push(&mut self, index: usize, content: String) {
        self.matches.push(SearchMatch {
            line: index,
            content,
        });
    }

    fn is_full(&self) -> bool {
        self.matches.len() >= MAX_SEARCH_RESULTS
    }

    fn batch(&self, progress: Option<ScanProgress>, done: bool) -> SearchBatch {
        let shown: Vec<SearchMatch> = self
            .matches
            .iter()
            .take(BATCH_PREVIEW_LIMIT)
            .cloned()
            .collect();
        SearchBatch {
            term: self.query.term().to_string(),
            has_more: self.matches.len() > shown.len(),
            total_matches: self.matches.len(),
            matches: shown,
            progress,
            done,
        }
    }
}

/// Synchronous search over an in-memory document: one final batch.
pub fn search_lines(lines: &[String], query: &SearchQuery) -> (SearchBatch, Vec<SearchMatch>) {
    let mut acc = Accumulator::new(query.clone());
    for (index, line) in lines.iter().enumerate() {
        if acc.is_full() {
            break;
        }
        if query.matches(line) {
            acc.push(index, line.clone());
        }
    }
    let batch = acc.batch(None, true);
    (batch, acc.matches)
}

/// Streaming search. Ends early once [`MAX_SEARCH_RESULTS`] matches are found.
pub struct SearchScan<R> {
    lines: LineStream<R>,
    acc: Accumulator,
    total: usize,
    processed: usize,
    finished: bool,
}

impl SearchScan<File> {
    pub fn open(
        path: &Path,
        encoding: TextEncoding,
        query: SearchQuery,
        total: usize,
        chunk_bytes: usize,
    ) -> Result<Self> {
        Ok(Self::new(
            LineStream::open(path, encoding, chunk_bytes)?,
            query,
            total,
        ))
    }
}

impl<R: std::io::Read> SearchScan<R> {
    pub fn new(lines: LineStream<R>, query: SearchQuery, total: usize) -> Self {
        Self {
            lines,
            acc: Accumulator::new(query),
            total,
            processed: 0,
            finished: false,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.lines = self.lines.with_cancel(cancel);
        self
    }

    fn progress(&self) -> ScanProgress {
        ScanProgress {
            processed: self.processed,
            total: self.total.max(self.processed),
        }
    }

    fn complete(&mut self) -> SearchEvent {
        self.finished = true;
        let batch = self.acc.batch(Some(self.progress()), true);
        SearchEvent::Complete {
            batch,
            matches: std::mem::take(&mut self.acc.matches),
        }
    }
}

impl<R: std::io::Read> Iterator for SearchScan<R> {
    type Item = Result<SearchEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        while let Some(item) = self.lines.next() {
            let (index, line) = match item {
                Ok(pair) => pair,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };
            self.processed += 1;
            if !self.acc.offer(index, line) {
                continue;
            }
            if self.acc.is_full() {
                tracing::debug!(term = self.acc.query.term(), "search result cap reached");
                return Some(Ok(self.complete()));
            }
            if self.acc.matches.len() % BATCH_EVERY_MATCHES == 0 {
                return Some(Ok(SearchEvent::Batch(
                    self.acc.batch(Some(self.progress()), false),
                )));
            }
        }
        Some(Ok(self.complete()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(text: &str, term: &str) -> Vec<SearchEvent> {
        let lines = LineStream::new(
            Cursor::new(text.as_bytes().to_vec()),
            Path::new("mem"),
            TextEncoding::Utf8,
            16,
        );
        let query = SearchQuery::new(term).expect("query");
        SearchScan::new(lines, query, 0)
            .collect::<Result<Vec<_>>>()
            .expect("search events")
    }

    #[test]
    fn materialized_scenario_finds_single_match() {
        let lines: Vec<String> = ["alpha", "beta", "gamma"].map(String::from).to_vec();
        let (batch, all) = search_lines(&lines, &SearchQuery::new("ta").expect("query"));
        assert_eq!(
            batch.matches,
            vec![SearchMatch {
                line: 1,
                content: "beta".into()
            }]
        );
        assert!(batch.done);
        assert!(!batch.has_more);
        assert_eq!(batch.progress, None);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn literal_and_case_sensitive() {
        let lines: Vec<String> = ["a.c", "abc", "A.C"].map(String::from).to_vec();
        let (batch, _) = search_lines(&lines, &SearchQuery::new("a.c").expect("query"));
        assert_eq!(batch.total_matches, 1);
        assert_eq!(batch.matches[0].line, 0);
    }

    #[test]
    fn empty_and_whitespace_terms_are_rejected() {
        assert!(matches!(SearchQuery::new(""), Err(ReaderError::EmptySearchTerm)));
        assert!(matches!(SearchQuery::new("  \t"), Err(ReaderError::EmptySearchTerm)));
    }

    #[test]
    fn batches_every_tenth_match() {
        let text = "hit\nmiss\n".repeat(25);
        let events = scan(&text, "hit");
        let batches: Vec<&SearchBatch> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Batch(b) => Some(b),
                SearchEvent::Complete { .. } => None,
            })
            .collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].total_matches, 10);
        assert_eq!(batches[1].total_matches, 20);
        assert!(batches.iter().all(|b| !b.done && b.progress.is_some()));

        let Some(SearchEvent::Complete { batch, matches }) = events.last() else {
            panic!("last event must be complete");
        };
        assert_eq!(batch.total_matches, 25);
        assert_eq!(matches.len(), 25);
        assert!(batch.done);
        assert!(!batch.has_more);
    }

    #[test]
    fn synchronous_and_streaming_search_agree() {
        let text = "a.c\nabc\nxa.cx\n\na.c";
        let lines = crate::decoder::decode(text.as_bytes()).lines;
        let (batch, direct) = search_lines(&lines, &SearchQuery::new("a.c").expect("query"));
        let Some(SearchEvent::Complete { matches, .. }) = scan(text, "a.c").pop() else {
            panic!("last event must be complete");
        };
        assert_eq!(direct, matches);
        assert_eq!(
            direct.iter().map(|m| m.line).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(batch.total_matches, 3);
    }

    #[test]
    fn caps_results_and_stops_early() {
        let text = "needle\n".repeat(1500);
        let events = scan(&text, "needle");
        let Some(SearchEvent::Complete { batch, matches }) = events.last() else {
            panic!("last event must be complete");
        };
        assert_eq!(matches.len(), MAX_SEARCH_RESULTS);
        assert_eq!(batch.total_matches, MAX_SEARCH_RESULTS);
        assert_eq!(batch.matches.len(), BATCH_PREVIEW_LIMIT);
        assert!(batch.has_more);
        assert_eq!(batch.progress.map(|p| p.processed), Some(MAX_SEARCH_RESULTS));
        for event in &events {
            if let SearchEvent::Batch(b) = event {
                assert!(b.matches.len() <= BATCH_PREVIEW_LIMIT);
                assert_eq!(b.has_more, b.total_matches > b.matches.len());
            }
        }
    }
}
