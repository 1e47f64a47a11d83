//! Text normalization and deterministic chunking.
//!
//! Chunking is character-based over normalized UTF-8 text: each chunk is at
//! most `max_length` bytes, consecutive chunks overlap by `overlap` bytes,
//! and splits prefer paragraph, sentence, then whitespace boundaries before
//! falling back to a hard cut. Identical input and parameters always yield
//! the identical chunk sequence.

use crate::types::Chunk;

/// Normalize extracted document text before chunking.
///
/// Strips private-use glyphs that PDF extraction leaves behind, collapses
/// runs of spaces and tabs, collapses runs of blank lines to a single blank
/// line, and trims surrounding whitespace. Chunk offsets refer to the
/// normalized text.
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in text.lines() {
        let mut line = String::with_capacity(raw.len());
        let mut prev_space = false;

        for ch in raw.chars() {
            // Private Use Area characters are bullet/symbol leftovers from
            // PDF extraction with no textual value.
            if ('\u{e000}'..='\u{f8ff}').contains(&ch) {
                continue;
            }
            if ch == ' ' || ch == '\t' {
                if !prev_space {
                    line.push(' ');
                }
                prev_space = true;
            } else {
                line.push(ch);
                prev_space = false;
            }
        }

        while line.ends_with(' ') {
            line.pop();
        }
        lines.push(line);
    }

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut prev_blank = false;
    for line in &lines {
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        kept.push(line.as_str());
        prev_blank = blank;
    }

    kept.join("\n").trim().to_string()
}

/// Find the section heading covering a chunk: the first line that looks like
/// an ALL-CAPS header (at least five characters, uppercase letters and
/// spaces only).
pub fn extract_heading(text: &str) -> Option<String> {
    text.lines().map(str::trim).find_map(|line| {
        let is_header = line.len() >= 5
            && line.chars().any(|c| c.is_ascii_uppercase())
            && line.chars().all(|c| c.is_ascii_uppercase() || c == ' ');
        is_header.then(|| line.to_string())
    })
}

/// Chunk text into overlapping segments with stable indices and offsets.
///
/// Guarantees:
/// - every chunk is at most `max_length` bytes;
/// - consecutive chunk spans overlap (no gaps), so the spans cover the text;
/// - empty text yields an empty sequence;
/// - text within the bound yields a single chunk.
pub fn chunk_text(document_id: &str, text: &str, max_length: usize, overlap: usize) -> Vec<Chunk> {
    if text.is_empty() || max_length == 0 {
        return vec![];
    }

    // The caller validates this at config time; clamp so the loop always
    // makes progress even on raw parameters.
    let overlap = overlap.min(max_length - 1);

    let mut chunks = Vec::new();
    let mut index = 0u32;
    let mut start = 0usize;

    loop {
        let hard_end = floor_char_boundary(text, (start + max_length).min(text.len()));
        let end = if hard_end < text.len() {
            split_point(text, start, hard_end)
        } else {
            hard_end
        };

        let body = &text[start..end];
        chunks.push(Chunk {
            document_id: document_id.to_string(),
            index,
            text: body.to_string(),
            start,
            end,
            heading: extract_heading(body),
        });
        index += 1;

        if end >= text.len() {
            break;
        }

        // Step back by the overlap; always move forward relative to the
        // previous start so the loop terminates.
        let next = end.saturating_sub(overlap).max(start + 1);
        start = ceil_char_boundary(text, next);
    }

    tracing::debug!(
        "Chunked '{}' into {} chunks (max_length: {}, overlap: {})",
        document_id,
        chunks.len(),
        max_length,
        overlap
    );

    chunks
}

/// Pick the split position inside `text[start..hard_end]`, preferring
/// paragraph breaks, then sentence ends, then line breaks, then spaces.
/// A natural boundary is only taken when it keeps the chunk above half the
/// window, otherwise the hard bound wins.
fn split_point(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let min_len = window.len() / 2;

    if let Some(pos) = window.rfind("\n\n") {
        let cut = pos + 2;
        if cut > min_len {
            return start + cut;
        }
    }

    let sentence_cut = [". ", ".\n", "? ", "?\n", "! ", "!\n"]
        .iter()
        .filter_map(|pat| window.rfind(pat).map(|pos| pos + pat.len()))
        .max();
    if let Some(cut) = sentence_cut {
        if cut > min_len {
            return start + cut;
        }
    }

    if let Some(pos) = window.rfind('\n') {
        let cut = pos + 1;
        if cut > min_len {
            return start + cut;
        }
    }

    if let Some(pos) = window.rfind(' ') {
        let cut = pos + 1;
        if cut > min_len {
            return start + cut;
        }
    }

    hard_end
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
