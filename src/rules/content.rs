/// Conversions between content literals, raw bytes and regex fragments
use crate::error::{RuleError, Result};
use std::fmt::Write;

/// Characters that may follow a backslash in a quoted rule value
const ESCAPABLE: &[u8] = b";:\"\\|";

/// Characters that must be backslash-escaped to match literally in a regex
const REGEX_META: &[u8] = b".*+?()[]{}^$|\\";

/// Decode a content literal (without surrounding quotes) into bytes.
///
/// Handles `\;`-style escapes and `|41 42|` hex blocks.
pub fn decode(literal: &str) -> Result<Vec<u8>> {
    let bytes = literal.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                match bytes.get(i + 1) {
                    Some(next) if ESCAPABLE.contains(next) => result.push(*next),
                    Some(next) => {
                        return Err(RuleError::InvalidFieldValue(format!(
                            "content: invalid escape '\\{}' at offset {}",
                            *next as char, i
                        )))
                    }
                    None => {
                        return Err(RuleError::InvalidFieldValue(
                            "content: trailing backslash".to_string(),
                        ))
                    }
                }
                i += 2;
            }
            b'|' => {
                let start = i + 1;
                let len = bytes[start..]
                    .iter()
                    .position(|&b| b == b'|')
                    .ok_or_else(|| {
                        RuleError::InvalidFieldValue(format!(
                            "content: unclosed hex block at offset {}",
                            i
                        ))
                    })?;
                decode_hex_block(&literal[start..start + len], &mut result)?;
                i = start + len + 1;
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }

    Ok(result)
}

/// Decode the inside of a `|..|` block, ignoring whitespace
fn decode_hex_block(block: &str, out: &mut Vec<u8>) -> Result<()> {
    let digits: Vec<u8> = block
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        return Err(RuleError::InvalidFieldValue(format!(
            "content: odd number of hex digits in |{}|",
            block
        )));
    }

    for pair in digits.chunks(2) {
        let hi = hex_value(pair[0]);
        let lo = hex_value(pair[1]);
        match (hi, lo) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => {
                return Err(RuleError::InvalidFieldValue(format!(
                    "content: invalid hex digit in |{}|",
                    block
                )))
            }
        }
    }

    Ok(())
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|d| d as u8)
}

/// Render bytes as a regex fragment that matches them literally.
///
/// CR and LF are deliberately loosened to `\.` so that line-ending
/// differences in captured traffic do not break the match. Bytes outside
/// printable ASCII are written as `\xHH`, which matches the raw byte only when
/// the expression is compiled with Unicode disabled.
pub fn to_regex_fragment(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());

    for &b in bytes {
        match b {
            b'\r' | b'\n' => out.push_str("\\."),
            _ if REGEX_META.contains(&b) => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02X}", b);
            }
        }
    }

    out
}

/// Bytes that cannot appear raw inside a quoted content literal
fn is_special(b: u8) -> bool {
    ESCAPABLE.contains(&b) || !(0x20..=0x7e).contains(&b)
}

/// Render bytes in canonical content-literal form.
///
/// Runs of adjacent special bytes share one hex block:
/// `b"a;:\r\nb"` becomes `a|3B 3A 0D 0A|b`.
pub fn to_canonical_form(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut in_block = false;

    for &b in bytes {
        if is_special(b) {
            if in_block {
                out.push(' ');
            } else {
                out.push('|');
                in_block = true;
            }
            let _ = write!(out, "{:02X}", b);
        } else {
            if in_block {
                out.push('|');
                in_block = false;
            }
            out.push(b as char);
        }
    }

    if in_block {
        out.push('|');
    }

    out
}

/// Resolve backslash escapes in a quoted non-content value such as `msg`
pub fn unescape_text(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next.is_ascii() && ESCAPABLE.contains(&(next as u8)) => out.push(next),
            Some(next) => {
                return Err(RuleError::InvalidFieldValue(format!(
                    "invalid escape '\\{}'",
                    next
                )))
            }
            None => {
                return Err(RuleError::InvalidFieldValue(
                    "trailing backslash".to_string(),
                ))
            }
        }
    }

    Ok(out)
}

/// Escape text so it can be written inside a quoted value
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '\\' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
