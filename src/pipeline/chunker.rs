//! Deterministic text chunker
//!
//! Text is cut at paragraph (line) boundaries, short paragraphs are packed together and
//! paragraphs longer than the limit are cut at sentence ends, falling back to whitespace and
//! finally to a plain character cut. Every chunk is an exact slice of the input, so its
//! character offsets always locate it in the stored page text.

/// A chunk of page text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position in the page, contiguous from 0
    pub ordinal: u32,

    /// Exact slice of the source text
    pub text: String,

    /// Character offset of the first character
    pub start: usize,

    /// Character offset one past the last character
    pub end: usize,
}

/// Byte range into the source text
type Span = (usize, usize);

/// Splits `text` into chunks of at most `max_chars` characters
///
/// Identical input always yields identical boundaries and ordinals.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);

    let mut units = Vec::new();
    for block in blocks(text) {
        if char_len(text, block) <= max_chars {
            units.push(block);
            continue;
        }
        for sentence in sentences(text, block) {
            if char_len(text, sentence) <= max_chars {
                units.push(sentence);
            } else {
                units.extend(hard_split(text, sentence, max_chars));
            }
        }
    }

    let spans = pack(text, &units, max_chars);

    let mut chunks = Vec::with_capacity(spans.len());
    let (mut byte_pos, mut char_pos) = (0, 0);
    for (ordinal, (s, e)) in spans.into_iter().enumerate() {
        char_pos += text[byte_pos..s].chars().count();
        let start = char_pos;
        let slice = &text[s..e];
        char_pos += slice.chars().count();
        byte_pos = e;

        chunks.push(TextChunk {
            ordinal: ordinal as u32,
            text: slice.to_string(),
            start,
            end: char_pos,
        });
    }
    chunks
}

fn char_len(text: &str, (s, e): Span) -> usize {
    text[s..e].chars().count()
}

/// Non-blank lines, trimmed
fn blocks(text: &str) -> Vec<Span> {
    let mut out = Vec::new();
    let mut pos = 0;
    for line in text.split('\n') {
        let start = pos + (line.len() - line.trim_start().len());
        let end = pos + line.trim_end().len();
        if end > start {
            out.push((start, end));
        }
        pos += line.len() + 1;
    }
    out
}

/// Sentences of a block: each ends at `.`, `!` or `?` followed by whitespace
fn sentences(text: &str, (s, e): Span) -> Vec<Span> {
    let slice = &text[s..e];
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = slice.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => {}
            _ => continue,
        }

        out.push((s + start, s + i + c.len_utf8()));
        start = slice.len();
        while let Some(&(k, w)) = chars.peek() {
            if w.is_whitespace() {
                chars.next();
            } else {
                start = k;
                break;
            }
        }
    }

    if start < slice.len() {
        out.push((s + start, e));
    }
    out
}

/// Cuts a span into pieces of at most `max_chars`, preferring whitespace
fn hard_split(text: &str, (mut s, e): Span, max_chars: usize) -> Vec<Span> {
    let mut out = Vec::new();

    while char_len(text, (s, e)) > max_chars {
        let limit = text[s..e]
            .char_indices()
            .nth(max_chars)
            .map_or(e, |(i, _)| s + i);

        let cut = text[s..limit]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, _)| s + i)
            .filter(|&i| i > s);

        match cut {
            Some(ws) => {
                out.push((s, s + text[s..ws].trim_end().len()));
                s = ws;
            }
            None => {
                out.push((s, limit));
                s = limit;
            }
        }
        s += text[s..e].len() - text[s..e].trim_start().len();
    }

    if s < e {
        out.push((s, e));
    }
    out
}

/// Greedily merges consecutive units while the covering slice fits
fn pack(text: &str, units: &[Span], max_chars: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut current: Option<Span> = None;

    for &(us, ue) in units {
        current = match current {
            None => Some((us, ue)),
            Some((cs, _)) if char_len(text, (cs, ue)) <= max_chars => Some((cs, ue)),
            Some(done) => {
                out.push(done);
                Some((us, ue))
            }
        };
    }

    out.extend(current);
    out
}
