//! Line-range reads for windowed documents.
//!
//! Blocks are aligned to `block_size` lines and kept in an LRU keyed by
//! `line / block_size`. A miss seeks to the block's first byte through the
//! sparse [`LineIndex`] and reads at most one block of lines.

use crate::decoder::TextEncoding;
use crate::error::{ReaderError, Result};
use crate::line_counter::{count_lines, FileStamp, LineCount, LineIndex};
use lru::LruCache;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BLOCK_SIZE: usize = 200;
pub const DEFAULT_MAX_CACHED_BLOCKS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBlock {
    pub start_line: usize,
    pub end_line: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub reloads: u64,
}

pub struct WindowCache {
    path: PathBuf,
    encoding: TextEncoding,
    total_lines: usize,
    index: LineIndex,
    stamp: Option<FileStamp>,
    read_chunk_bytes: usize,
    blocks: LruCache<usize, CachedBlock>,
    stats: CacheStats,
}

impl WindowCache {
    pub fn new(
        path: &Path,
        count: LineCount,
        max_cached_blocks: usize,
        read_chunk_bytes: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(max_cached_blocks.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            path: path.to_path_buf(),
            encoding: count.encoding,
            total_lines: count.total_lines,
            index: count.index,
            stamp: count.stamp,
            read_chunk_bytes,
            blocks: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn block_size(&self) -> usize {
        self.index.block_size()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn cached_keys(&self) -> Vec<usize> {
        self.blocks.iter().map(|(key, _)| *key).collect()
    }

    pub fn cached_block(&self, key: usize) -> Option<&CachedBlock> {
        self.blocks.peek(&key)
    }

    /// Lines `start..=end`, clamped to the document. Read failures are logged
    /// and produce an empty window.
    pub fn get_range(&mut self, start: usize, end: usize) -> Vec<String> {
        match self.try_get_range(start, end) {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    start,
                    end,
                    "window read failed: {err}"
                );
                Vec::new()
            }
        }
    }

    pub fn try_get_range(&mut self, start: usize, end: usize) -> Result<Vec<String>> {
        if !self.covers(start, end) {
            self.revalidate()?;
        }
        let Some((start, end)) = clamp_range(start, end, self.total_lines) else {
            return Ok(Vec::new());
        };

        let block_size = self.block_size();
        let mut out = Vec::with_capacity(end - start + 1);
        for key in start / block_size..=end / block_size {
            if self.blocks.contains(&key) {
                self.stats.hits += 1;
            } else {
                self.stats.misses += 1;
                let block = self.load_block(key)?;
                if block.lines.is_empty() {
                    break;
                }
                if let Some((evicted, _)) = self.blocks.push(key, block) {
                    if evicted != key {
                        self.stats.evictions += 1;
                        tracing::trace!(evicted, "evicted window block");
                    }
                }
            }
            let Some(block) = self.blocks.get(&key) else {
                break;
            };
            let from = start.max(block.start_line) - block.start_line;
            let to = end.min(block.end_line) - block.start_line;
            if let Some(slice) = block.lines.get(from..=to) {
                out.extend(slice.iter().cloned());
            }
        }
        Ok(out)
    }

    fn covers(&self, start: usize, end: usize) -> bool {
        let Some((start, end)) = clamp_range(start, end, self.total_lines) else {
            return false;
        };
        let block_size = self.block_size();
        (start / block_size..=end / block_size).all(|key| self.blocks.contains(&key))
    }

    /// Recounts the document when it changed on disk since the last count.
    fn revalidate(&mut self) -> Result<()> {
        let current = FileStamp::read(&self.path)?;
        if self.stamp == Some(current) {
            return Ok(());
        }
        let block_size = self.block_size();
        let count = count_lines(&self.path, block_size, self.read_chunk_bytes)?;
        if count.total_lines != self.total_lines {
            tracing::warn!(
                path = %self.path.display(),
                previous = self.total_lines,
                current = count.total_lines,
                "document changed on disk; line count updated"
            );
        }
        self.blocks.clear();
        self.total_lines = count.total_lines;
        self.encoding = count.encoding;
        self.index = count.index;
        self.stamp = count.stamp;
        self.stats.reloads += 1;
        Ok(())
    }

    fn load_block(&self, key: usize) -> Result<CachedBlock> {
        let block_size = self.block_size();
        let start_line = key * block_size;
        let Some(offset) = self.index.block_offset(key) else {
            return Ok(CachedBlock {
                start_line,
                end_line: start_line,
                lines: Vec::new(),
            });
        };

        let mut file = File::open(&self.path).map_err(|e| ReaderError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ReaderError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(self.read_chunk_bytes.max(1), file);
        let wanted = block_size.min(self.total_lines.saturating_sub(start_line));
        let mut lines = Vec::with_capacity(wanted);
        let mut raw = Vec::new();
        while lines.len() < wanted {
            raw.clear();
            let n = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| ReaderError::io(&self.path, e))?;
            if n == 0 {
                break;
            }
            if raw.last() == Some(&b'\n') {
                raw.pop();
            }
            let line_no = start_line + lines.len();
            lines.push(self.encoding.decode_line(line_no, &raw));
        }

        tracing::trace!(key, offset, lines = lines.len(), "loaded window block");
        Ok(CachedBlock {
            start_line,
            end_line: start_line + lines.len().saturating_sub(1),
            lines,
        })
    }
}

/// Clamps `start..=end` to `0..total_lines`; `None` when nothing is left.
pub fn clamp_range(start: usize, end: usize, total_lines: usize) -> Option<(usize, usize)> {
    if total_lines == 0 || start >= total_lines {
        return None;
    }
    let end = end.min(total_lines - 1).max(start);
    Some((start, end))
}
