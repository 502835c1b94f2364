//! Byte-level token routines for the PDF body.
//!
//! The lexer is a stateless set of routines parameterized on the source
//! cursor. PDF lexical tokens are byte-oriented; no UTF-8 decoding is
//! performed anywhere in here.

use super::error::{SigError, SigResult};
use super::source::Source;

/// Checks if a byte is whitespace according to the PDF spec.
///
/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// Checks if a byte is a delimiter according to the PDF spec.
///
/// PDF delimiters: ( ) < > [ ] { } / %
pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        0x28 | 0x29 | 0x3C | 0x3E | 0x5B | 0x5D | 0x7B | 0x7D | 0x2F | 0x25
    )
}

/// Checks if a byte is special (whitespace or delimiter).
pub fn is_special(ch: u8) -> bool {
    is_whitespace(ch) || is_delimiter(ch)
}

/// Checks if a byte is an ASCII decimal digit.
pub fn is_digit(ch: u8) -> bool {
    ch.is_ascii_digit()
}

/// Skips whitespace and `%` comments.
///
/// A comment runs from `%` to the end of the line. The magic `%%EOF` and
/// `%PDF-` markers are recognized explicitly by their callers before this
/// routine ever sees them.
pub fn skip_whitespace(src: &mut dyn Source) -> SigResult<()> {
    let mut comment = false;

    while let Some(ch) = src.peek_byte()? {
        if comment {
            if ch == 0x0A || ch == 0x0D {
                comment = false;
            }
        } else if ch == b'%' {
            comment = true;
        } else if !is_whitespace(ch) {
            break;
        }
        src.skip(1)?;
    }

    Ok(())
}

/// Requires the exact literal at the cursor (after whitespace) and
/// advances past it.
///
/// On a mismatch the cursor is restored, so callers may probe for one of
/// several alternatives.
pub fn skip_word(src: &mut dyn Source, word: &[u8]) -> SigResult<()> {
    let saved = src.pos();
    skip_whitespace(src)?;
    let word_start = src.pos();

    for &expected in word {
        match src.peek_byte()? {
            Some(ch) if ch == expected => src.skip(1)?,
            _ => {
                src.seek(saved)?;
                return Err(SigError::malformed_at(
                    format!("expected '{}'", String::from_utf8_lossy(word)),
                    word_start,
                ));
            }
        }
    }

    Ok(())
}

/// Parses an unsigned decimal number `[0-9]+` after optional whitespace.
///
/// Fails without consuming input if no digit is present.
pub fn parse_number(src: &mut dyn Source) -> SigResult<u64> {
    let saved = src.pos();
    skip_whitespace(src)?;
    let num_start = src.pos();

    let mut value: u64 = 0;
    let mut digits = 0usize;

    while let Some(ch) = src.peek_byte()? {
        if !is_digit(ch) {
            break;
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(ch - b'0')))
            .ok_or_else(|| SigError::malformed_at("number out of range", num_start))?;
        digits += 1;
        src.skip(1)?;
    }

    if digits == 0 {
        src.seek(saved)?;
        return Err(SigError::malformed_at("expected a number", num_start));
    }

    Ok(value)
}

/// Reads a hex string `<...>` and returns its body verbatim.
///
/// Everything between the angle brackets is retained as-is, whitespace
/// included; rejection of non-hex characters happens at decode time in
/// [`decode_hex`].
pub fn parse_hex_string(src: &mut dyn Source) -> SigResult<Vec<u8>> {
    skip_word(src, b"<")?;

    let mut raw = Vec::new();
    loop {
        let at = src.pos();
        match src.peek_byte()? {
            None => return Err(SigError::malformed_at("unterminated hex string", at)),
            Some(b'>') => {
                src.skip(1)?;
                return Ok(raw);
            }
            Some(ch) => {
                push_grow(&mut raw, ch)?;
                src.skip(1)?;
            }
        }
    }
}

/// Reads a name token `/Name` and returns its bytes (without the slash).
pub fn parse_name(src: &mut dyn Source) -> SigResult<Vec<u8>> {
    skip_word(src, b"/")?;
    let name_start = src.pos();

    let mut name = Vec::new();
    while let Some(ch) = src.peek_byte()? {
        if is_special(ch) {
            break;
        }
        push_grow(&mut name, ch)?;
        src.skip(1)?;
    }

    if name.is_empty() {
        return Err(SigError::malformed_at("empty name token", name_start));
    }

    Ok(name)
}

/// Decodes the raw body of a hex string into bytes.
///
/// Whitespace is stripped first; an odd number of digits implies a final
/// zero nibble, as PDF readers conventionally assume.
pub fn decode_hex(raw: &[u8]) -> SigResult<Vec<u8>> {
    let mut compact = Vec::new();
    compact.try_reserve_exact(raw.len() + 1)?;
    for &ch in raw {
        if !is_whitespace(ch) {
            compact.push(ch);
        }
    }
    if compact.len() % 2 != 0 {
        compact.push(b'0');
    }

    hex::decode(&compact).map_err(|e| SigError::content(format!("invalid hex string: {}", e)))
}

/// Appends one byte, doubling the buffer capacity through fallible
/// reservation so allocation failure surfaces as an error instead of an
/// abort.
pub(crate) fn push_grow(buf: &mut Vec<u8>, byte: u8) -> SigResult<()> {
    if buf.len() == buf.capacity() {
        buf.try_reserve(buf.capacity().max(64))?;
    }
    buf.push(byte);
    Ok(())
}
