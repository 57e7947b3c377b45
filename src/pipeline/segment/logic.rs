// Chunked-window segmentation: completion tokens -> (context, next-chunk) records.

use std::num::NonZeroUsize;

use anyhow::{Context, Result};

use crate::dataset::TrainingRecord;
use crate::tokenizer::TokenCodec;

/// Half-open token range `[start, end)` of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    index: usize,
    pub start: usize,
    pub end: usize,
}

impl Window {
    fn is_empty(&self) -> bool { self.start >= self.end }
}

/// Non-overlapping windows of `stride` tokens covering `0..len`; the last may be shorter.
#[derive(Debug, Clone)]
pub struct Windows {
    len: usize,
    stride: usize,
    next: usize,
    index: usize,
}

pub fn windows(len: usize, stride: NonZeroUsize) -> Windows {
    Windows { len, stride: stride.get(), next: 0, index: 0 }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next >= self.len { return None; }
        let start = self.next;
        let end = start.saturating_add(self.stride).min(self.len);
        let w = Window { index: self.index, start, end };
        self.next = end;
        self.index += 1;
        Some(w)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = window_count(self.len - self.next.min(self.len), self.stride);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Windows {}

/// `ceil(len / stride)`, zero for an empty sequence.
pub fn window_count(len: usize, stride: usize) -> usize {
    len.div_ceil(stride)
}

/// Lazy per-row record stream; see [`segment`].
pub struct Segments<'a, C: TokenCodec + ?Sized> {
    codec: &'a C,
    source_id: i64,
    prompt: &'a str,
    ids: &'a [u32],
    windows: Windows,
    emitted: usize,
}

/// Pair every window of `ids` with the text a draft model sees before it:
/// the rendered prompt plus every completion token before the window.
///
/// Prefix and window are decoded independently with special tokens kept,
/// each through the codec's own post-decode cleanup (for `HfTokenizer`, the
/// model config's `clean_up_tokenization_spaces`).
/// Per-window decoding is authoritative: for tokenizers whose detokenization
/// is not compositional at a boundary, `context + target` of one record can
/// differ from the next record's context.
pub fn segment<'a, C: TokenCodec + ?Sized>(
    codec: &'a C,
    source_id: i64,
    prompt: &'a str,
    ids: &'a [u32],
    stride: NonZeroUsize,
) -> Segments<'a, C> {
    Segments { codec, source_id, prompt, ids, windows: windows(ids.len(), stride), emitted: 0 }
}

impl<'a, C: TokenCodec + ?Sized> Segments<'a, C> {
    fn record(&self, w: Window) -> Result<TrainingRecord> {
        let prefix_text = self.codec
            .decode(&self.ids[..w.start], true)
            .with_context(|| format!("decode prefix of chunk {} for idx={}", w.index, self.source_id))?;
        let target_text = self.codec
            .decode(&self.ids[w.start..w.end], true)
            .with_context(|| format!("decode chunk {} for idx={}", w.index, self.source_id))?;

        let mut context_text = String::with_capacity(self.prompt.len() + prefix_text.len());
        context_text.push_str(self.prompt);
        context_text.push_str(&prefix_text);

        Ok(TrainingRecord {
            source_id: self.source_id,
            chunk_index: self.emitted,
            context_text,
            target_text,
        })
    }
}

impl<'a, C: TokenCodec + ?Sized> Iterator for Segments<'a, C> {
    type Item = Result<TrainingRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let w = self.windows.next()?;
            // a zero-length chunk is never written
            if w.is_empty() { continue; }
            let rec = self.record(w);
            if rec.is_ok() { self.emitted += 1; }
            return Some(rec);
        }
    }
}
