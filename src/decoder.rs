//! Byte to text decoding.
//!
//! Encodings are tried in a fixed order: strict UTF-8, strict GBK, then a
//! permissive UTF-8 decode that replaces invalid sequences. Lines are split on
//! `\n` only. Both candidate encodings are ASCII compatible, so splitting the
//! raw bytes first and decoding each line gives the same result as decoding
//! the whole buffer and splitting the text.

use encoding_rs::{Decoder, DecoderResult, GBK, UTF_8};
use serde::Serialize;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    Gbk,
    Lossy,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Gbk => "GBK",
            Self::Lossy => "UTF-8 (lossy)",
        }
    }

    /// Decodes the bytes of line `index`, without its `\n` terminator.
    pub fn decode_line(self, index: usize, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => {
                let bytes = if index == 0 {
                    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
                } else {
                    bytes
                };
                String::from_utf8_lossy(bytes).into_owned()
            }
            Self::Gbk => GBK.decode_without_bom_handling(bytes).0.into_owned(),
            Self::Lossy => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub encoding: TextEncoding,
    pub lines: Vec<String>,
}

pub fn detect_encoding(bytes: &[u8]) -> TextEncoding {
    if UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .is_some()
    {
        return TextEncoding::Utf8;
    }
    if GBK
        .decode_without_bom_handling_and_without_replacement(bytes)
        .is_some()
    {
        return TextEncoding::Gbk;
    }
    TextEncoding::Lossy
}

pub fn decode(bytes: &[u8]) -> DecodedText {
    let encoding = detect_encoding(bytes);
    DecodedText {
        encoding,
        lines: split_lines(bytes, encoding),
    }
}

pub fn split_lines(bytes: &[u8], encoding: TextEncoding) -> Vec<String> {
    let mut parts: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    if parts.last().is_some_and(|last| last.is_empty()) {
        parts.pop();
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(index, raw)| encoding.decode_line(index, raw))
        .collect()
}

/// Streaming counterpart of [`detect_encoding`].
///
/// Chunks are fed through strict decoders so a multi-byte sequence split
/// across a chunk boundary is validated as a whole.
pub struct EncodingProbe {
    utf8: Option<Decoder>,
    gbk: Option<Decoder>,
    scratch: String,
}

impl Default for EncodingProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingProbe {
    pub fn new() -> Self {
        Self {
            utf8: Some(UTF_8.new_decoder_without_bom_handling()),
            gbk: Some(GBK.new_decoder_without_bom_handling()),
            scratch: String::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.push(chunk, false);
    }

    pub fn finish(mut self) -> TextEncoding {
        self.push(&[], true);
        if self.utf8.is_some() {
            TextEncoding::Utf8
        } else if self.gbk.is_some() {
            TextEncoding::Gbk
        } else {
            TextEncoding::Lossy
        }
    }

    fn push(&mut self, chunk: &[u8], last: bool) {
        if let Some(decoder) = self.utf8.as_mut() {
            if !feed_strict(decoder, &mut self.scratch, chunk, last) {
                self.utf8 = None;
            }
        }
        if let Some(decoder) = self.gbk.as_mut() {
            if !feed_strict(decoder, &mut self.scratch, chunk, last) {
                self.gbk = None;
            }
        }
    }
}

fn feed_strict(decoder: &mut Decoder, scratch: &mut String, mut input: &[u8], last: bool) -> bool {
    loop {
        scratch.clear();
        if let Some(needed) = decoder.max_utf8_buffer_length_without_replacement(input.len()) {
            scratch.reserve(needed);
        }
        let (result, read) = decoder.decode_to_string_without_replacement(input, scratch, last);
        match result {
            DecoderResult::InputEmpty => return true,
            DecoderResult::Malformed(_, _) => return false,
            DecoderResult::OutputFull => input = &input[read..],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(bytes: &[u8], chunk: usize) -> TextEncoding {
        let mut probe = EncodingProbe::new();
        for piece in bytes.chunks(chunk) {
            probe.feed(piece);
        }
        probe.finish()
    }

    #[test]
    fn splits_on_line_feed_only() {
        let decoded = decode(b"alpha\r\nbeta\ngamma");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert_eq!(decoded.lines, vec!["alpha\r", "beta", "gamma"]);
    }

    #[test]
    fn trailing_newline_does_not_add_a_line() {
        assert_eq!(decode(b"a\nb\n").lines, vec!["a", "b"]);
        assert_eq!(decode(b"a\n\nb").lines, vec!["a", "", "b"]);
        assert!(decode(b"").lines.is_empty());
        assert_eq!(decode(b"\n").lines, vec![""]);
    }

    #[test]
    fn falls_back_to_gbk_for_legacy_bytes() {
        // "第一章" encoded as GBK.
        let (bytes, _, had_errors) = GBK.encode("第一章\n正文");
        assert!(!had_errors);
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Gbk);
        assert_eq!(decoded.lines, vec!["第一章", "正文"]);
    }

    #[test]
    fn falls_back_to_lossy_when_nothing_fits() {
        let decoded = decode(b"ok\n\xFF\xFF\xFF\n");
        assert_eq!(decoded.encoding, TextEncoding::Lossy);
        assert_eq!(decoded.lines[0], "ok");
        assert!(decoded.lines[1].contains('\u{FFFD}'));
    }

    #[test]
    fn utf8_bom_is_stripped_from_first_line() {
        let decoded = decode(b"\xEF\xBB\xBFtitle\nbody");
        assert_eq!(decoded.lines, vec!["title", "body"]);
    }

    #[test]
    fn probe_agrees_with_whole_buffer_detection() {
        let utf8 = "前言\n第一章 开始\nplain ascii\n".repeat(50);
        let (gbk, _, _) = GBK.encode(&utf8);
        let broken = [&b"abc\n"[..], &[0xFF, 0xFE, 0x00][..], &b"\nxyz"[..]].concat();

        for bytes in [utf8.as_bytes(), &gbk[..], broken.as_slice()] {
            let expected = detect_encoding(bytes);
            for chunk in [1, 3, 7, 64, 4096] {
                assert_eq!(probe(bytes, chunk), expected, "chunk size {chunk}");
            }
        }
    }

    #[test]
    fn probe_matches_detection_for_truncated_tail() {
        let bytes = "章".as_bytes();
        assert_eq!(probe(&bytes[..2], 1), detect_encoding(&bytes[..2]));
    }
}
