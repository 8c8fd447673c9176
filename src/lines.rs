use crate::decoder::TextEncoding;
use crate::error::{ReaderError, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_READ_CHUNK_BYTES: usize = 64 * 1024;

/// Chunked line reader.
///
/// Yields `(index, line)` for every `\n`-terminated line and for a non-empty
/// trailing fragment, using the same boundaries as the line counter and the
/// materialized split. The cancel flag is checked before every chunk read.
pub struct LineStream<R> {
    reader: R,
    path: PathBuf,
    encoding: TextEncoding,
    chunk_bytes: usize,
    buffer: Vec<u8>,
    cursor: usize,
    /// Bytes after `cursor` already known to hold no `\n`.
    scanned: usize,
    next_index: usize,
    eof: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl LineStream<File> {
    pub fn open(path: &Path, encoding: TextEncoding, chunk_bytes: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReaderError::io(path, e))?;
        Ok(Self::new(file, path, encoding, chunk_bytes))
    }
}

impl<R: Read> LineStream<R> {
    pub fn new(reader: R, path: &Path, encoding: TextEncoding, chunk_bytes: usize) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            encoding,
            chunk_bytes: chunk_bytes.max(1),
            buffer: Vec::new(),
            cursor: 0,
            scanned: 0,
            next_index: 0,
            eof: false,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn emit(&mut self, end: usize) -> (usize, String) {
        let index = self.next_index;
        let line = self
            .encoding
            .decode_line(index, &self.buffer[self.cursor..end]);
        self.next_index = self.next_index.saturating_add(1);
        self.scanned = 0;
        (index, line)
    }

    fn halt(&mut self) {
        self.eof = true;
        self.buffer.clear();
        self.cursor = 0;
        self.scanned = 0;
    }

    fn fill(&mut self) -> Result<()> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            self.halt();
            return Err(ReaderError::Cancelled);
        }

        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        let kept = self.buffer.len();
        self.buffer.resize(kept + self.chunk_bytes, 0);
        loop {
            match self.reader.read(&mut self.buffer[kept..]) {
                Ok(0) => {
                    self.buffer.truncate(kept);
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.buffer.truncate(kept + n);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.halt();
                    return Err(ReaderError::io(&self.path, err));
                }
            }
        }
    }
}

impl<R: Read> Iterator for LineStream<R> {
    type Item = Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let from = self.cursor + self.scanned;
            if let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
                let end = from + offset;
                let item = self.emit(end);
                self.cursor = end + 1;
                return Some(Ok(item));
            }
            self.scanned = self.buffer.len() - self.cursor;
            if self.eof {
                if self.cursor < self.buffer.len() {
                    let end = self.buffer.len();
                    let item = self.emit(end);
                    self.cursor = end;
                    return Some(Ok(item));
                }
                return None;
            }
            if let Err(err) = self.fill() {
                return Some(Err(err));
            }
        }
    }
}
