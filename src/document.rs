use crate::config::ReaderConfig;
use crate::decoder::{self, TextEncoding};
use crate::error::{ReaderError, Result};
use crate::line_counter::count_lines;
use crate::window_cache::{clamp_range, WindowCache};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    Materialized,
    Windowed,
}

pub enum DocumentContent {
    Materialized(Arc<Vec<String>>),
    Windowed(WindowCache),
}

pub struct Document {
    pub path: PathBuf,
    pub byte_size: u64,
    pub total_lines: usize,
    pub encoding: TextEncoding,
    pub content: DocumentContent,
}

impl Document {
    pub fn mode(&self) -> DocumentMode {
        match self.content {
            DocumentContent::Materialized(_) => DocumentMode::Materialized,
            DocumentContent::Windowed(_) => DocumentMode::Windowed,
        }
    }

    /// Synchronous range read in either mode.
    pub fn get_range(&mut self, start: usize, end: usize) -> Vec<String> {
        match &mut self.content {
            DocumentContent::Materialized(lines) => slice_lines(lines.as_slice(), start, end),
            DocumentContent::Windowed(cache) => {
                let lines = cache.get_range(start, end);
                self.total_lines = cache.total_lines();
                lines
            }
        }
    }
}

pub fn slice_lines(lines: &[String], start: usize, end: usize) -> Vec<String> {
    match clamp_range(start, end, lines.len()) {
        Some((start, end)) => lines[start..=end].to_vec(),
        None => Vec::new(),
    }
}

/// Chooses materialized or windowed mode from the file size.
pub fn open(path: &Path, config: &ReaderConfig) -> Result<Document> {
    let meta = fs::metadata(path).map_err(|e| ReaderError::io(path, e))?;
    let byte_size = meta.len();

    let document = if byte_size > config.large_file_threshold {
        let count = count_lines(path, config.chunk_size, config.read_chunk_bytes)?;
        Document {
            path: path.to_path_buf(),
            byte_size,
            total_lines: count.total_lines,
            encoding: count.encoding,
            content: DocumentContent::Windowed(WindowCache::new(
                path,
                count,
                config.max_cached_blocks,
                config.read_chunk_bytes,
            )),
        }
    } else {
        let bytes = fs::read(path).map_err(|e| ReaderError::io(path, e))?;
        let decoded = decoder::decode(&bytes);
        Document {
            path: path.to_path_buf(),
            byte_size,
            total_lines: decoded.lines.len(),
            encoding: decoded.encoding,
            content: DocumentContent::Materialized(Arc::new(decoded.lines)),
        }
    };

    tracing::info!(
        path = %path.display(),
        bytes = byte_size,
        lines = document.total_lines,
        encoding = document.encoding.label(),
        mode = ?document.mode(),
        "opened document"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_root(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("tome-rs-document-{name}-{nonce}"))
    }

    fn config(threshold: u64) -> ReaderConfig {
        ReaderConfig {
            large_file_threshold: threshold,
            chunk_size: 16,
            max_cached_blocks: 3,
            read_chunk_bytes: 64,
            ..ReaderConfig::default()
        }
    }

    #[test]
    fn small_file_is_materialized() {
        let root = test_root("small");
        fs::create_dir_all(&root).expect("create dir");
        let file = root.join("doc.txt");
        fs::write(&file, "alpha\nbeta\ngamma").expect("write doc");

        let mut doc = open(&file, &ReaderConfig::default()).expect("open");
        assert_eq!(doc.mode(), DocumentMode::Materialized);
        assert_eq!(doc.total_lines, 3);
        assert_eq!(doc.get_range(0, 1), vec!["alpha", "beta"]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn size_equal_to_threshold_stays_materialized() {
        let root = test_root("equal");
        fs::create_dir_all(&root).expect("create dir");
        let file = root.join("doc.txt");
        fs::write(&file, "12345").expect("write doc");

        assert_eq!(open(&file, &config(5)).expect("open").mode(), DocumentMode::Materialized);
        assert_eq!(open(&file, &config(4)).expect("open").mode(), DocumentMode::Windowed);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn windowed_and_materialized_ranges_agree() {
        let root = test_root("agree");
        fs::create_dir_all(&root).expect("create dir");
        let file = root.join("doc.txt");
        let body: String = (0..137)
            .map(|i| if i % 11 == 0 { "\n".to_string() } else { format!("行 {i}\r\n") })
            .collect();
        fs::write(&file, format!("{body}tail")).expect("write doc");

        let mut materialized = open(&file, &config(u64::MAX)).expect("open materialized");
        let mut windowed = open(&file, &config(0)).expect("open windowed");
        assert_eq!(windowed.mode(), DocumentMode::Windowed);
        assert_eq!(materialized.total_lines, windowed.total_lines);

        let total = materialized.total_lines;
        for (start, end) in [(0, 0), (0, 15), (14, 33), (100, total - 1), (5, 120)] {
            let expected = materialized.get_range(start, end);
            assert_eq!(expected.len(), end - start + 1);
            assert_eq!(windowed.get_range(start, end), expected, "range {start}..={end}");
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_file_is_io_error() {
        let missing = test_root("missing").join("doc.txt");
        let err = open(&missing, &ReaderConfig::default()).err().expect("missing file");
        assert!(matches!(err, ReaderError::Io { .. }));
    }
}
