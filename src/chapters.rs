use crate::decoder::TextEncoding;
use crate::error::{ReaderError, Result};
use crate::lines::LineStream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub const DEFAULT_CHAPTER_PATTERN: &str = r"^(第[0-9０-９零〇一二两三四五六七八九十百千万]+[章节回卷集部篇]|(?i:chapter)\s+[0-9IVXLCDM]+\b|序章|楔子|尾声|番外)";
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Progress(ScanProgress),
    Complete(Vec<Chapter>),
}

pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ReaderError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn match_chapter(index: usize, line: &str, pattern: &Regex) -> Option<Chapter> {
    let trimmed = line.trim();
    if trimmed.is_empty() || !pattern.is_match(trimmed) {
        return None;
    }
    Some(Chapter {
        name: trimmed.to_string(),
        line: index,
    })
}

/// Synchronous scan over an in-memory document.
pub fn scan_lines(lines: &[String], pattern: &Regex) -> Vec<Chapter> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| match_chapter(index, line, pattern))
        .collect()
}

/// Streaming chapter scan.
///
/// Yields a progress event every `interval` lines and finally the complete
/// chapter list. The scan cannot be resumed; a new scan starts from line 0.
pub struct ChapterScan<R> {
    lines: LineStream<R>,
    pattern: Regex,
    total: usize,
    interval: usize,
    processed: usize,
    chapters: Vec<Chapter>,
    finished: bool,
}

impl ChapterScan<File> {
    pub fn open(
        path: &Path,
        encoding: TextEncoding,
        pattern: Regex,
        total: usize,
        chunk_bytes: usize,
    ) -> Result<Self> {
        Ok(Self::new(
            LineStream::open(path, encoding, chunk_bytes)?,
            pattern,
            total,
        ))
    }
}

impl<R: std::io::Read> ChapterScan<R> {
    pub fn new(lines: LineStream<R>, pattern: Regex, total: usize) -> Self {
        Self {
            lines,
            pattern,
            total,
            interval: DEFAULT_PROGRESS_INTERVAL,
            processed: 0,
            chapters: Vec::new(),
            finished: false,
        }
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.lines = self.lines.with_cancel(cancel);
        self
    }
}

impl<R: std::io::Read> Iterator for ChapterScan<R> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for item in self.lines.by_ref() {
            let (index, line) = match item {
                Ok(pair) => pair,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };
            if let Some(chapter) = match_chapter(index, &line, &self.pattern) {
                self.chapters.push(chapter);
            }
            self.processed += 1;
            if self.processed % self.interval == 0 {
                return Some(Ok(ScanEvent::Progress(ScanProgress {
                    processed: self.processed,
                    total: self.total.max(self.processed),
                })));
            }
        }
        self.finished = true;
        Some(Ok(ScanEvent::Complete(std::mem::take(&mut self.chapters))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(text: &str, chunk: usize) -> LineStream<Cursor<Vec<u8>>> {
        LineStream::new(
            Cursor::new(text.as_bytes().to_vec()),
            Path::new("mem"),
            TextEncoding::Utf8,
            chunk,
        )
    }

    fn run(text: &str, pattern: &str, interval: usize) -> (Vec<ScanProgress>, Vec<Chapter>) {
        let pattern = compile_pattern(pattern).expect("pattern");
        let mut progress = Vec::new();
        let mut chapters = None;
        for event in ChapterScan::new(stream(text, 7), pattern, 0).with_interval(interval) {
            match event.expect("scan event") {
                ScanEvent::Progress(p) => progress.push(p),
                ScanEvent::Complete(list) => chapters = Some(list),
            }
        }
        (progress, chapters.expect("complete event"))
    }

    #[test]
    fn default_pattern_matches_common_headings() {
        let pattern = compile_pattern(DEFAULT_CHAPTER_PATTERN).expect("default pattern");
        for heading in ["第一章 开端", "第12回", "Chapter 3: Storm", "CHAPTER IV", "楔子"] {
            assert!(pattern.is_match(heading), "{heading}");
        }
        assert!(!pattern.is_match("the chapter ends"));
    }

    #[test]
    fn streaming_scan_matches_materialized_scan() {
        let text = "  第一章 起\nbody\n\n第二章 承\nmore\n   \n第三章 转";
        let (_, streamed) = run(text, DEFAULT_CHAPTER_PATTERN, 2);
        let lines = crate::decoder::decode(text.as_bytes()).lines;
        let pattern = compile_pattern(DEFAULT_CHAPTER_PATTERN).expect("pattern");
        let direct = scan_lines(&lines, &pattern);

        assert_eq!(streamed, direct);
        assert_eq!(
            streamed,
            vec![
                Chapter { name: "第一章 起".into(), line: 0 },
                Chapter { name: "第二章 承".into(), line: 3 },
                Chapter { name: "第三章 转".into(), line: 6 },
            ]
        );
    }

    #[test]
    fn progress_is_reported_every_interval() {
        let text = "x\n".repeat(10);
        let (progress, chapters) = run(&text, "^y", 3);
        let processed: Vec<usize> = progress.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![3, 6, 9]);
        assert!(chapters.is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = compile_pattern("(unclosed").expect_err("bad pattern");
        assert!(matches!(err, ReaderError::Pattern { .. }));
    }

    #[test]
    fn whitespace_only_trailing_fragment_is_skipped() {
        let (_, chapters) = run("Chapter 1\n  ", ".*", 100);
        assert_eq!(chapters.len(), 1);
    }
}
