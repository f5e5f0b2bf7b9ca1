// src/chunker.rs
//! Fixed-width text splitting used both when buffering alerts and when posting.

use thiserror::Error;

/// Mastodon's default status limit, and the reference post size.
pub const DEFAULT_MAX_CHARS: usize = 500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk length must be greater than zero")]
    ZeroLength,
}

/// Split `text` into contiguous pieces of at most `max_len` chars.
///
/// Lengths are counted in Unicode scalar values, so a piece never ends in the
/// middle of a code point. Empty input yields no pieces.
pub fn chunk(text: &str, max_len: usize) -> Result<Vec<String>, ChunkError> {
    if max_len == 0 {
        return Err(ChunkError::ZeroLength);
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == max_len {
            out.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    Ok(out)
}
