use crate::chapters::{DEFAULT_CHAPTER_PATTERN, DEFAULT_PROGRESS_INTERVAL};
use crate::lines::DEFAULT_READ_CHUNK_BYTES;
use crate::window_cache::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CACHED_BLOCKS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderConfig {
    /// Files larger than this many bytes are read in windowed mode.
    pub large_file_threshold: u64,
    /// Lines per cached block.
    pub chunk_size: usize,
    /// Lines kept loaded on either side of the reading position.
    pub buffer_lines: usize,
    pub scroll_step: usize,
    pub default_chapter_pattern: String,
    pub max_cached_blocks: usize,
    pub read_chunk_bytes: usize,
    pub scan_progress_interval: usize,
    pub progress_debounce_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_BLOCK_SIZE,
            buffer_lines: 50,
            scroll_step: 3,
            default_chapter_pattern: DEFAULT_CHAPTER_PATTERN.to_string(),
            max_cached_blocks: DEFAULT_MAX_CACHED_BLOCKS,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            scan_progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_debounce_ms: 2000,
        }
    }
}

impl ReaderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config.normalized())
    }

    /// Zero sizes would stall the readers; they are raised to 1.
    pub fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.max_cached_blocks = self.max_cached_blocks.max(1);
        self.read_chunk_bytes = self.read_chunk_bytes.max(1);
        self.scan_progress_interval = self.scan_progress_interval.max(1);
        self.scroll_step = self.scroll_step.max(1);
        self
    }

    pub fn progress_debounce(&self) -> Duration {
        Duration::from_millis(self.progress_debounce_ms)
    }
}
