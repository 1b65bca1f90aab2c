use crate::types::{NormalizedUnit, RawSnapshot};

/// Clean one raw recognition result into a comparable unit.
///
/// Deterministic and infallible: unrecognizable input degrades to an empty
/// unit, never an error. Case, diacritics, and script are preserved; only
/// whitespace, line-wrap hyphenation, and non-linguistic noise are touched.
pub fn normalize(raw: &RawSnapshot) -> NormalizedUnit {
    let text = clean_text(&raw.text);
    let chars = text.chars().count();
    NormalizedUnit {
        text,
        ts_ms: raw.ts_ms,
        confidence: raw.confidence,
        chars,
    }
}

fn clean_text(raw: &str) -> String {
    let joined = join_hyphen_wraps(raw);
    let mut out = String::with_capacity(joined.len());
    for token in joined.split_whitespace() {
        if is_noise_token(token) {
            continue;
        }
        let cleaned: String = token.chars().filter(|c| !is_noise_char(*c)).collect();
        if cleaned.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&cleaned);
    }
    out
}

/// Characters that never carry subtitle content.
fn is_noise_char(c: char) -> bool {
    matches!(c, '♪' | '♫' | '♬' | '\u{fffd}') || c.is_control()
}

/// Non-speech event markers like `[BLANK_AUDIO]`, `(♪)` or `（音乐）`.
fn is_noise_token(token: &str) -> bool {
    let bracketed = (token.starts_with('[') && token.ends_with(']'))
        || (token.starts_with('(') && token.ends_with(')'))
        || (token.starts_with('（') && token.ends_with('）'));
    bracketed || token.chars().all(is_noise_char)
}

/// Rejoin words the OCR saw split across lines: "wor-\nld" -> "world".
fn join_hyphen_wraps(raw: &str) -> String {
    if !raw.contains('-') {
        return raw.to_string();
    }
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' {
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j], '\r' | '\n') {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].is_alphabetic() {
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
