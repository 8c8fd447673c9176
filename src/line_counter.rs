use crate::decoder::{EncodingProbe, TextEncoding};
use crate::error::{ReaderError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::SystemTime;

/// Byte offsets of every `block_size`-th line start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    block_size: usize,
    offsets: Vec<u64>,
}

impl LineIndex {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            offsets: vec![0],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Offset of the first line of block `key`.
    pub fn block_offset(&self, key: usize) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn blocks(&self) -> usize {
        self.offsets.len()
    }

    fn record(&mut self, line: usize, offset: u64) {
        if line % self.block_size == 0 {
            self.offsets.push(offset);
        }
    }

    fn truncate_to(&mut self, total_lines: usize) {
        let keep = total_lines.div_ceil(self.block_size).max(1);
        self.offsets.truncate(keep);
    }
}

/// Identity of the file contents a count was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    pub fn read(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|e| ReaderError::io(path, e))?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LineCount {
    pub total_lines: usize,
    pub encoding: TextEncoding,
    pub index: LineIndex,
    pub stamp: Option<FileStamp>,
}

pub fn count_lines(path: &Path, block_size: usize, chunk_bytes: usize) -> Result<LineCount> {
    let stamp = FileStamp::read(path)?;
    let file = File::open(path).map_err(|e| ReaderError::io(path, e))?;
    let mut count =
        count_reader(file, block_size, chunk_bytes).map_err(|e| ReaderError::io(path, e))?;
    count.stamp = Some(stamp);
    tracing::debug!(
        path = %path.display(),
        total_lines = count.total_lines,
        encoding = count.encoding.label(),
        "counted lines"
    );
    Ok(count)
}

pub fn count_reader<R: Read>(
    mut reader: R,
    block_size: usize,
    chunk_bytes: usize,
) -> std::io::Result<LineCount> {
    let mut chunk = vec![0u8; chunk_bytes.max(1)];
    let mut index = LineIndex::new(block_size);
    let mut probe = EncodingProbe::new();
    let mut newlines = 0usize;
    let mut offset = 0u64;
    let mut last_byte = None;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let data = &chunk[..n];
        probe.feed(data);
        for (i, byte) in data.iter().enumerate() {
            if *byte == b'\n' {
                newlines += 1;
                index.record(newlines, offset + i as u64 + 1);
            }
        }
        last_byte = data.last().copied();
        offset += n as u64;
    }

    let total_lines = match last_byte {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    };
    index.truncate_to(total_lines);
    Ok(LineCount {
        total_lines,
        encoding: probe.finish(),
        index,
        stamp: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    fn test_root(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("tome-rs-{name}-{nonce}"))
    }

    fn count(bytes: &[u8]) -> LineCount {
        count_reader(Cursor::new(bytes.to_vec()), 2, 3).expect("count")
    }

    #[test]
    fn counts_with_and_without_trailing_newline() {
        assert_eq!(count(b"a\nb\nc\n").total_lines, 3);
        assert_eq!(count(b"a\nb\nc").total_lines, 3);
        assert_eq!(count(b"").total_lines, 0);
        assert_eq!(count(b"\n").total_lines, 1);
        assert_eq!(count(b"\n\nx").total_lines, 3);
    }

    #[test]
    fn index_records_block_starts() {
        // lines: "aa" @0, "b" @3, "cc" @5, "d" @8, "e" @10
        let counted = count(b"aa\nb\ncc\nd\ne");
        assert_eq!(counted.total_lines, 5);
        assert_eq!(counted.index.block_offset(0), Some(0));
        assert_eq!(counted.index.block_offset(1), Some(5));
        assert_eq!(counted.index.block_offset(2), Some(10));
        assert_eq!(counted.index.block_offset(3), None);
    }

    #[test]
    fn index_has_no_block_past_the_end() {
        let counted = count(b"a\nb\nc\nd\n");
        assert_eq!(counted.total_lines, 4);
        assert_eq!(counted.index.blocks(), 2);
    }

    #[test]
    fn count_lines_reads_file_and_stamp() {
        let root = test_root("count-file");
        fs::create_dir_all(&root).expect("create dir");
        let file = root.join("doc.txt");
        fs::write(&file, "x\ny\n").expect("write doc");

        let counted = count_lines(&file, 200, 64 * 1024).expect("count file");
        assert_eq!(counted.total_lines, 2);
        assert_eq!(counted.encoding, TextEncoding::Utf8);
        assert_eq!(counted.stamp.map(|s| s.len), Some(4));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn count_lines_reports_missing_file() {
        let missing = test_root("count-missing").join("nope.txt");
        let err = count_lines(&missing, 200, 1024).expect_err("missing file");
        assert!(matches!(err, ReaderError::Io { .. }));
    }
}
