//! Tokenizer: turns accumulated body text into reveal parts.
//!
//! The tokenizer owns the message's raw-text accumulator and a cursor that
//! marks how much of it has already been cut into parts. Each call to
//! [`Tokenizer::extend`] appends a delta and returns only the parts that
//! became complete.
//!
//! # Parts
//!
//! - **Word**: optional leading whitespace, a run of non-whitespace
//!   graphemes, and the whitespace that follows it. A word is complete once
//!   whitespace follows it, so a word split across two deltas is never
//!   emitted half-formed.
//! - **Atomic block**: a fenced region (```` ``` ```` or `~~~`, at least
//!   three, at line start with up to three spaces of indent), from the
//!   opening marker through the closing fence line. Nothing inside an open
//!   fence is emitted until the closing line has arrived.
//!
//! Parts partition the consumed text exactly: concatenating every part
//! yields the accumulated text up to the cursor.

use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Characters that can open a fence.
const FENCE_MARKERS: [char; 2] = ['`', '~'];

/// Minimum marker run that opens a fence.
const MIN_FENCE_LEN: usize = 3;

/// Maximum indent (in spaces) before a fence marker.
const MAX_FENCE_INDENT: usize = 3;

/// Kind of a reveal part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// A whitespace-delimited word.
    Word,
    /// A complete fenced region.
    AtomicBlock {
        /// 1-based position among the message's atomic blocks.
        ordinal: usize,
        /// `false` when the stream ended before the closing fence.
        terminated: bool,
    },
}

/// An immutable reveal unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    kind: PartKind,
    text: String,
    end: usize,
}

impl Part {
    /// Kind of this part.
    pub const fn kind(&self) -> PartKind {
        self.kind
    }

    /// Text covered by this part.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset in the accumulated text just past this part.
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Whether this part is an atomic block.
    pub const fn is_atomic(&self) -> bool {
        matches!(self.kind, PartKind::AtomicBlock { .. })
    }
}

/// A fence whose closing line has not been seen yet.
#[derive(Debug, Clone, Copy)]
struct OpenFence {
    /// Marker character (backtick or tilde).
    marker: char,
    /// Length of the opening marker run.
    len: usize,
    /// Start of the next line to test as a closing fence, once known.
    next_line: Option<usize>,
    /// Text before this offset holds no unprocessed newline.
    searched: usize,
}

/// Progress on the word starting at the cursor, kept across deltas.
#[derive(Debug, Clone, Copy, Default)]
struct WordScan {
    /// Offset of the word's first non-whitespace grapheme, once seen.
    start: Option<usize>,
    /// Where the next grapheme search resumes.
    resume: usize,
    /// A fence was ruled out at `start`.
    not_fence: bool,
}

/// Outcome of one scanning step.
enum Step {
    /// A part was completed.
    Emit(Part),
    /// State changed without emitting (a fence opened).
    Continue,
    /// More text is needed.
    Wait,
}

/// Outcome of probing a word start for a fence marker.
enum FenceProbe {
    Fence { marker: char, len: usize },
    NotFence,
    Undecided,
}

/// Incremental tokenizer for one message body.
///
/// Each call only walks the bytes appended since the previous one (plus
/// at most one grapheme), so a long token streamed in tiny deltas stays
/// linear.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    /// Raw-text accumulator.
    text: String,
    /// Bytes already cut into parts.
    cursor: usize,
    /// Start of the line containing the cursor.
    line_start: usize,
    /// Word being assembled at the cursor.
    word: WordScan,
    /// Fence currently being buffered.
    open_fence: Option<OpenFence>,
    /// Atomic blocks emitted so far.
    atomic_blocks: usize,
}

impl Tokenizer {
    /// Create an empty tokenizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return the parts it completed.
    pub fn extend(&mut self, suffix: &str) -> Vec<Part> {
        self.text.push_str(suffix);
        self.scan(false)
    }

    /// Emit everything still held back.
    ///
    /// An unterminated fence is flushed as a best-effort atomic block.
    pub fn finish(&mut self) -> Vec<Part> {
        self.scan(true)
    }

    /// The whole accumulated text.
    pub fn accumulated(&self) -> &str {
        &self.text
    }

    /// Text not yet cut into parts.
    pub fn remainder(&self) -> &str {
        &self.text[self.cursor..]
    }

    /// Text withheld because it starts an unterminated fence.
    pub fn open_block(&self) -> Option<&str> {
        self.open_fence.map(|_| self.remainder())
    }

    /// Number of atomic blocks emitted so far.
    pub const fn atomic_blocks(&self) -> usize {
        self.atomic_blocks
    }

    fn scan(&mut self, at_end: bool) -> Vec<Part> {
        let mut parts = Vec::new();
        while self.cursor < self.text.len() {
            let step = if self.open_fence.is_some() {
                self.close_block(at_end)
            } else {
                self.next_word(at_end)
            };
            match step {
                Step::Emit(part) => parts.push(part),
                Step::Continue => {}
                Step::Wait => break,
            }
        }
        parts
    }

    fn next_word(&mut self, at_end: bool) -> Step {
        let word_start = match self.word.start {
            Some(start) => start,
            None => match seek(&self.text, self.word.resume, |g| !is_whitespace(g)) {
                Ok(start) => {
                    self.word.start = Some(start);
                    self.word.resume = start;
                    start
                }
                // Only whitespace left; it leads the next word.
                Err(resume) => return self.hold_word(resume, at_end),
            },
        };

        if !self.word.not_fence {
            match self.probe_fence(word_start, at_end) {
                FenceProbe::Fence { marker, len } => {
                    self.open_fence = Some(OpenFence {
                        marker,
                        len,
                        next_line: None,
                        searched: word_start,
                    });
                    return Step::Continue;
                }
                FenceProbe::Undecided => return Step::Wait,
                FenceProbe::NotFence => self.word.not_fence = true,
            }
        }

        let word_end = match seek(&self.text, self.word.resume, is_whitespace) {
            Ok(end) => end,
            Err(resume) => return self.hold_word(resume, at_end),
        };

        let part_end = seek(&self.text, word_end, |g| !is_whitespace(g)).unwrap_or(self.text.len());
        Step::Emit(self.cut(part_end, PartKind::Word))
    }

    /// Remember where the word search stopped, or emit the tail at the end.
    fn hold_word(&mut self, resume: usize, at_end: bool) -> Step {
        if at_end {
            return Step::Emit(self.cut(self.text.len(), PartKind::Word));
        }
        self.word.resume = resume;
        Step::Wait
    }

    fn probe_fence(&self, at: usize, at_end: bool) -> FenceProbe {
        let line_start = self.text[self.cursor..at]
            .rfind('\n')
            .map_or(self.line_start, |nl| self.cursor + nl + 1);
        let indent = &self.text[line_start..at];
        if indent.len() > MAX_FENCE_INDENT || !indent.bytes().all(|b| b == b' ') {
            return FenceProbe::NotFence;
        }

        let rest = &self.text[at..];
        let Some(marker) = rest.chars().next().filter(|c| FENCE_MARKERS.contains(c)) else {
            return FenceProbe::NotFence;
        };
        let len = rest.chars().take_while(|&c| c == marker).count();

        if len >= MIN_FENCE_LEN {
            FenceProbe::Fence { marker, len }
        } else if len == rest.len() && !at_end {
            // "``" at the very end may still grow into a fence.
            FenceProbe::Undecided
        } else {
            FenceProbe::NotFence
        }
    }

    fn close_block(&mut self, at_end: bool) -> Step {
        let Some(mut fence) = self.open_fence else {
            return Step::Continue;
        };

        while let Some(nl) = self.text[fence.searched..].find('\n') {
            let line_end = fence.searched + nl;
            if let Some(line_start) = fence.next_line {
                if is_closing_fence(&self.text[line_start..line_end], fence.marker, fence.len) {
                    return Step::Emit(self.cut_block(line_end + 1, true));
                }
            }
            fence.next_line = Some(line_end + 1);
            fence.searched = line_end + 1;
        }
        fence.searched = self.text.len();

        if at_end {
            if let Some(line_start) = fence.next_line {
                if is_closing_fence(&self.text[line_start..], fence.marker, fence.len) {
                    return Step::Emit(self.cut_block(self.text.len(), true));
                }
            }
        }
        self.hold_or_force(fence, at_end)
    }

    fn hold_or_force(&mut self, fence: OpenFence, at_end: bool) -> Step {
        if !at_end {
            self.open_fence = Some(fence);
            return Step::Wait;
        }

        warn!(
            bytes = self.text.len() - self.cursor,
            marker = %fence.marker,
            "Stream ended inside a fenced block; flushing it unterminated"
        );
        Step::Emit(self.cut_block(self.text.len(), false))
    }

    fn cut_block(&mut self, end: usize, terminated: bool) -> Part {
        self.open_fence = None;
        self.atomic_blocks += 1;
        let kind = PartKind::AtomicBlock {
            ordinal: self.atomic_blocks,
            terminated,
        };
        self.cut(end, kind)
    }

    fn cut(&mut self, end: usize, kind: PartKind) -> Part {
        let text = self.text[self.cursor..end].to_string();
        if let Some(nl) = text.rfind('\n') {
            self.line_start = self.cursor + nl + 1;
        }
        self.cursor = end;
        self.word = WordScan {
            resume: end,
            ..WordScan::default()
        };
        Part { kind, text, end }
    }
}

/// Offset of the first grapheme at or after `from` matching `pred`.
///
/// On a miss, returns the start of the last grapheme visited (or `from`):
/// resuming there re-reads a grapheme that later text may still extend.
fn seek(text: &str, from: usize, pred: impl Fn(&str) -> bool) -> Result<usize, usize> {
    let mut resume = from;
    for (offset, grapheme) in text[from..].grapheme_indices(true) {
        if pred(grapheme) {
            return Ok(from + offset);
        }
        resume = from + offset;
    }
    Err(resume)
}

fn is_whitespace(grapheme: &str) -> bool {
    grapheme.chars().next().is_some_and(char::is_whitespace)
}

/// Whether `line` closes a fence opened with `len` copies of `marker`.
fn is_closing_fence(line: &str, marker: char, len: usize) -> bool {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let body = line.trim_start_matches(' ');
    if line.len() - body.len() > MAX_FENCE_INDENT {
        return false;
    }

    let run = body.chars().take_while(|&c| c == marker).count();
    run >= len && body[run * marker.len_utf8()..].trim().is_empty()
}
