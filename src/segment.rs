//! Incremental sentence segmentation for streaming synthesis
//!
//! Turns a growing token buffer into complete sentences so synthesis can
//! start before the full response exists. Abbreviations ("Dr.", "dll.")
//! and decimal numbers ("3.500") never close a sentence.

/// Minimum accepted sentence length (chars, trimmed) mid-stream.
/// The final flush ignores this.
pub const MIN_SENTENCE_CHARS: usize = 8;

/// Words that end with a period without closing a sentence.
/// Covers common Indonesian and English abbreviations.
const ABBREVIATIONS: [&str; 21] = [
    "dr", "mr", "mrs", "ms", "prof", "jr", "sr", "vs", "etc", "inc", "ltd",
    "dll", "dsb", "dkk", "spt", "yth", "no", "vol", "hal", "tel", "fax",
];

/// Try to pull one complete sentence off the front of `buffer`.
///
/// Returns the extracted sentence, if an acceptable boundary exists, and
/// the remaining buffer. Boundary search order:
///
/// 1. a newline past position 0, when the trimmed text before it is at
///    least [`MIN_SENTENCE_CHARS`] long;
/// 2. the first `.`, `!` or `?` followed by whitespace. A `.` preceded
///    by a digit or ending an abbreviation does not close the sentence
///    and the search continues; a candidate shorter than
///    [`MIN_SENTENCE_CHARS`] stops the search so the text keeps
///    buffering.
#[must_use]
pub fn extract_sentence(buffer: &str) -> (Option<String>, String) {
    // Rule 1: newline boundary.
    for (idx, ch) in buffer.char_indices() {
        if ch == '\n' && idx > 0 {
            let candidate = buffer[..idx].trim();
            if candidate.chars().count() >= MIN_SENTENCE_CHARS {
                return (
                    Some(candidate.to_string()),
                    buffer[idx + 1..].trim_start().to_string(),
                );
            }
            break;
        }
    }

    // Rule 2: sentence-ending punctuation followed by whitespace.
    let chars: Vec<(usize, char)> = buffer.char_indices().collect();
    for i in 0..chars.len() {
        let (idx, ch) = chars[i];
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = chars
            .get(i + 1)
            .is_some_and(|&(_, next)| next.is_whitespace());
        if !followed_by_space {
            continue;
        }

        let end = idx + ch.len_utf8();
        if ch == '.' {
            // Decimal guard: "3.14" never splits.
            if i > 0 && chars[i - 1].1.is_ascii_digit() {
                continue;
            }
            // Abbreviation guard: "Dr. Budi" keeps scanning.
            if ends_with_abbreviation(&buffer[..end]) {
                continue;
            }
        }

        let candidate = buffer[..end].trim();
        if candidate.chars().count() < MIN_SENTENCE_CHARS {
            // Too short to speak on its own; wait for more text.
            return (None, buffer.to_string());
        }
        return (
            Some(candidate.to_string()),
            buffer[end..].trim_start().to_string(),
        );
    }

    (None, buffer.to_string())
}

/// Split a known-complete text with the same boundary rules.
///
/// Any trailing fragment is emitted verbatim, mirroring the final flush
/// of the streaming path.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut rest = text.to_string();
    loop {
        let (sentence, remainder) = extract_sentence(&rest);
        rest = remainder;
        match sentence {
            Some(s) => sentences.push(s),
            None => break,
        }
    }
    let tail = rest.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Does the text before a period end in a known abbreviation?
fn ends_with_abbreviation(prefix: &str) -> bool {
    let stripped = prefix.trim_end_matches(['.', '!', '?']);
    let Some(word) = stripped.split_whitespace().last() else {
        return false;
    };
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}
