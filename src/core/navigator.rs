//! Indirect object navigation.
//!
//! Resolves `(object, generation)` references through the xref table,
//! positions the source at object bodies, and provides the dictionary
//! walking primitives used by every consumer of the object graph.

use super::error::{SigError, SigResult};
use super::lexer;
use super::source::Source;
use super::xref::XrefTable;

/// Identifies one object revision within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndirectRef {
    pub obj_num: u32,
    pub gen_num: u16,
}

impl IndirectRef {
    pub fn new(obj_num: u32, gen_num: u16) -> Self {
        IndirectRef { obj_num, gen_num }
    }
}

impl std::fmt::Display for IndirectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.obj_num, self.gen_num)
    }
}

/// Where a dictionary lives: behind an indirect reference, or inline at a
/// known byte offset (PDF allows both for entries like `/AcroForm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjLocation {
    Reference(IndirectRef),
    Offset(u64),
}

/// Dictionary keys the verifier cares about.
///
/// Names read from the body are interned against this table; everything
/// else maps to `Unknown` and gets skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKey {
    SubFilter,
    Cert,
    Contents,
    ByteRange,
    Fields,
    Type,
    SubType,
    AcroForm,
    Root,
    Size,
    Prev,
    V,
    Ft,
    SigFlags,
    Unknown,
}

impl DictKey {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"SubFilter" => DictKey::SubFilter,
            b"Cert" => DictKey::Cert,
            b"Contents" => DictKey::Contents,
            b"ByteRange" => DictKey::ByteRange,
            b"Fields" => DictKey::Fields,
            b"Type" => DictKey::Type,
            b"SubType" | b"Subtype" => DictKey::SubType,
            b"AcroForm" => DictKey::AcroForm,
            b"Root" => DictKey::Root,
            b"Size" => DictKey::Size,
            b"Prev" => DictKey::Prev,
            b"V" => DictKey::V,
            b"FT" => DictKey::Ft,
            b"SigFlags" => DictKey::SigFlags,
            _ => DictKey::Unknown,
        }
    }
}

/// Positions the source at the body of the referenced object.
///
/// Looks the reference up in the xref table, seeks to the recorded
/// offset, and consumes the `N G obj` header, verifying that the header
/// numbers match the reference. The cursor is left at the first byte of
/// the object body.
pub fn goto_obj(src: &mut dyn Source, xref: &XrefTable, r: IndirectRef) -> SigResult<()> {
    let entry = xref.entry(r.obj_num, r.gen_num).ok_or_else(|| {
        SigError::content(format!("object {} not present in xref table", r))
    })?;

    if !entry.in_use {
        return Err(SigError::content(format!("object {} is free", r)));
    }

    src.seek(entry.byte_offset)?;

    let obj_num = lexer::parse_number(src)?;
    let gen_num = lexer::parse_number(src)?;
    lexer::skip_word(src, b"obj")?;

    if obj_num != u64::from(r.obj_num) || gen_num != u64::from(r.gen_num) {
        return Err(SigError::malformed_at(
            format!(
                "object header {} {} does not match reference {}",
                obj_num, gen_num, r
            ),
            entry.byte_offset,
        ));
    }

    Ok(())
}

/// Positions the source at a dictionary given either form of location.
pub fn goto_location(src: &mut dyn Source, xref: &XrefTable, loc: ObjLocation) -> SigResult<()> {
    match loc {
        ObjLocation::Reference(r) => goto_obj(src, xref, r),
        ObjLocation::Offset(offset) => src.seek(offset),
    }
}

/// Parses an indirect reference `N G R`.
pub fn parse_indirect_ref(src: &mut dyn Source) -> SigResult<IndirectRef> {
    let at = src.pos();
    let obj_num = lexer::parse_number(src)?;
    let gen_num = lexer::parse_number(src)?;
    lexer::skip_word(src, b"R")?;

    let obj_num = u32::try_from(obj_num)
        .map_err(|_| SigError::malformed_at("object number out of range", at))?;
    let gen_num = u16::try_from(gen_num)
        .map_err(|_| SigError::malformed_at("generation number out of range", at))?;

    Ok(IndirectRef { obj_num, gen_num })
}

/// Reads the next dictionary key, or `None` when `>>` closes the
/// dictionary.
pub fn parse_dict_key(src: &mut dyn Source) -> SigResult<Option<DictKey>> {
    lexer::skip_whitespace(src)?;

    if src.peek_byte()? == Some(b'>') {
        lexer::skip_word(src, b">>")?;
        return Ok(None);
    }

    let name = lexer::parse_name(src)?;
    Ok(Some(DictKey::from_name(&name)))
}

/// Maximum container nesting accepted while skipping an unknown value.
const MAX_VALUE_DEPTH: usize = 32;

/// Advances past one dictionary value of arbitrary type.
///
/// Handles names, numbers, literal strings with escapes, hex strings,
/// arrays, nested dictionaries, indirect references, and the bare
/// keywords `true`/`false`/`null`.
pub fn skip_dict_unknown_value(src: &mut dyn Source) -> SigResult<()> {
    skip_value(src, 0)
}

fn skip_value(src: &mut dyn Source, depth: usize) -> SigResult<()> {
    if depth > MAX_VALUE_DEPTH {
        return Err(SigError::malformed_at("value nesting too deep", src.pos()));
    }

    lexer::skip_whitespace(src)?;
    let at = src.pos();

    match src.peek_byte()? {
        None => Err(SigError::malformed_at("unexpected end of file", at)),

        Some(b'/') => {
            lexer::parse_name(src)?;
            Ok(())
        }

        Some(b'(') => skip_literal_string(src),

        Some(b'[') => {
            src.skip(1)?;
            loop {
                lexer::skip_whitespace(src)?;
                match src.peek_byte()? {
                    None => {
                        return Err(SigError::malformed_at("unterminated array", at));
                    }
                    Some(b']') => {
                        src.skip(1)?;
                        return Ok(());
                    }
                    Some(_) => skip_value(src, depth + 1)?,
                }
            }
        }

        Some(b'<') => {
            src.skip(1)?;
            if src.peek_byte()? == Some(b'<') {
                src.skip(1)?;
                skip_dict_body(src, depth + 1)
            } else {
                // hex string, consume up to the closing bracket
                loop {
                    match src.peek_byte()? {
                        None => {
                            return Err(SigError::malformed_at("unterminated hex string", at));
                        }
                        Some(b'>') => {
                            src.skip(1)?;
                            return Ok(());
                        }
                        Some(_) => src.skip(1)?,
                    }
                }
            }
        }

        Some(ch) if lexer::is_digit(ch) => {
            lexer::parse_number(src)?;

            if src.peek_byte()? == Some(b'.') {
                // real number, consume the fraction
                src.skip(1)?;
                while let Some(d) = src.peek_byte()? {
                    if !lexer::is_digit(d) {
                        break;
                    }
                    src.skip(1)?;
                }
                return Ok(());
            }

            // could be the first number of an indirect reference
            let resume = src.pos();
            if lexer::parse_number(src).is_ok() && lexer::skip_word(src, b"R").is_ok() {
                return Ok(());
            }
            src.seek(resume)
        }

        Some(_) => {
            // bare token: true, false, null, or a signed/leading-dot number
            let mut consumed = 0usize;
            while let Some(ch) = src.peek_byte()? {
                if lexer::is_special(ch) {
                    break;
                }
                src.skip(1)?;
                consumed += 1;
            }
            if consumed == 0 {
                return Err(SigError::malformed_at("unexpected token", at));
            }
            Ok(())
        }
    }
}

fn skip_dict_body(src: &mut dyn Source, depth: usize) -> SigResult<()> {
    loop {
        lexer::skip_whitespace(src)?;
        match src.peek_byte()? {
            None => {
                return Err(SigError::malformed_at("unterminated dictionary", src.pos()));
            }
            Some(b'>') => {
                lexer::skip_word(src, b">>")?;
                return Ok(());
            }
            Some(_) => {
                lexer::parse_name(src)?;
                skip_value(src, depth)?;
            }
        }
    }
}

fn skip_literal_string(src: &mut dyn Source) -> SigResult<()> {
    let at = src.pos();
    src.skip(1)?; // opening paren
    let mut open = 1u32;

    loop {
        match src.peek_byte()? {
            None => return Err(SigError::malformed_at("unterminated string", at)),
            Some(b'\\') => {
                // escape sequence, the next byte never affects balance
                src.skip(2)?;
            }
            Some(b'(') => {
                open += 1;
                src.skip(1)?;
            }
            Some(b')') => {
                open -= 1;
                src.skip(1)?;
                if open == 0 {
                    return Ok(());
                }
            }
            Some(_) => src.skip(1)?,
        }
    }
}
