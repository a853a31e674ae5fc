//! Safety buffering for medical answers
//!
//! Ordinary text passes straight through. Once the pending text contains an
//! emergency term, a dosage, or a number that may still be growing into one,
//! only complete sentences are released so a reader never sees a half-formed
//! instruction such as "Call 911 if" or "Take 50".

use std::sync::LazyLock;

use regex::Regex;

/// Terms that switch the filter into sentence buffering
const CRITICAL_TERMS: &[&str] = &[
    "emergency",
    "call",
    "immediately",
    "urgent",
    "overdose",
    "poison",
    "anaphylaxis",
    "anaphylactic",
    "seizure",
    "stroke",
    "cardiac",
    "chest",
    "unconscious",
    "unresponsive",
    "bleeding",
    "hemorrhage",
    "haemorrhage",
    "suicide",
    "choking",
    "dose",
    "dosage",
    "dosing",
];

/// Emergency numbers, matched as whole words
const EMERGENCY_NUMBERS: &[&str] = &["911", "999", "112"];

static CRITICAL: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i)\b(?:{})\b|\b(?:{})\w*",
        EMERGENCY_NUMBERS.join("|"),
        CRITICAL_TERMS.join("|")
    );
    Regex::new(&pattern).expect("critical term list is a valid pattern")
});

static DOSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:[.,]\d+)?\s*(?:mg|mcg|µg|g|kg|ml|l|units?|iu|meq|mmol|tablets?|capsules?|drops?|puffs?)\b",
    )
    .expect("dosage pattern is valid")
});

/// A number at the end of the text, possibly followed by a unit still forming
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d[\d.,]*\s*[a-zµ]*$").expect("trailing number pattern is valid")
});

/// Whether `text` needs sentence buffering
pub fn is_critical(text: &str) -> bool {
    CRITICAL.is_match(text) || DOSAGE.is_match(text) || TRAILING_NUMBER.is_match(text)
}

/// Per-message filter; not shared between streams
#[derive(Debug, Default)]
pub struct MedicalStreamingFilter {
    buffer: String,
    released: String,
    safety_warnings: usize,
}

impl MedicalStreamingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token and return whatever is now safe to show
    pub fn add_token(&mut self, token: &str) -> Option<String> {
        self.buffer.push_str(token);
        let ready = self.take_ready();
        self.release(ready)
    }

    /// Release everything still held, complete or not
    ///
    /// Releasing incomplete critical content is logged and counted in
    /// [`safety_warnings`](Self::safety_warnings).
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        if is_critical(&self.buffer) {
            self.safety_warnings += 1;
            log::warn!(
                "Releasing incomplete critical medical content at end of stream: {:?}",
                self.buffer
            );
        }
        let rest = std::mem::take(&mut self.buffer);
        self.release(rest)
    }

    /// Everything released so far, in order
    pub fn released_content(&self) -> &str {
        &self.released
    }

    /// Text held back from the reader
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn is_buffering(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Number of flushes that released incomplete critical content
    pub fn safety_warnings(&self) -> usize {
        self.safety_warnings
    }

    fn release(&mut self, text: String) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        self.released.push_str(&text);
        Some(text)
    }

    fn take_ready(&mut self) -> String {
        let mut ready = String::new();
        while !self.buffer.is_empty() {
            if !is_critical(&self.buffer) {
                let hold_from = partial_term_start(&self.buffer);
                ready.extend(self.buffer.drain(..hold_from));
                break;
            }
            match last_sentence_end(&self.buffer) {
                Some(end) => ready.extend(self.buffer.drain(..end)),
                None => break,
            }
        }
        ready
    }
}

/// Byte offset just past the last complete sentence
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace, or at the end
/// of the text unless the mark follows a digit (a decimal may be forming).
fn last_sentence_end(text: &str) -> Option<usize> {
    let mut end = None;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                Some((_, next)) if next.is_whitespace() => end = Some(i + 1),
                None if !prev.is_some_and(|p| p.is_ascii_digit()) => end = Some(i + 1),
                _ => {}
            }
        }
        prev = Some(c);
    }
    end
}

/// Start of a trailing partial word that may still become a critical term
///
/// Returns `text.len()` when nothing needs holding.
fn partial_term_start(text: &str) -> usize {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric())
        .last()
        .map_or(text.len(), |(i, _)| i);
    let word = text[start..].to_lowercase();
    if word.is_empty() {
        return text.len();
    }

    let could_grow = CRITICAL_TERMS
        .iter()
        .chain(EMERGENCY_NUMBERS)
        .any(|term| term.len() > word.len() && term.starts_with(&word));
    if could_grow { start } else { text.len() }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod filter_tests;
