//! Catalog → AcroForm → signature field traversal.

use super::error::{SigError, SigResult};
use super::lexer;
use super::navigator::{self, DictKey, IndirectRef, ObjLocation};
use super::source::Source;
use super::xref::XrefTable;
use log::debug;

/// What the AcroForm dictionary yields.
#[derive(Debug, Default)]
pub struct AcroformInfo {
    /// `SigFlags` value; bit 0 set means the document has signatures
    pub sig_flags: u64,
    /// The interactive form fields, as indirect references
    pub fields: Vec<IndirectRef>,
}

impl AcroformInfo {
    pub fn signatures_exist(&self) -> bool {
        self.sig_flags & 0x01 != 0
    }
}

/// Navigates to the catalog and extracts the `AcroForm` entry.
///
/// The catalog must carry `/Type /Catalog`. `AcroForm` may be written
/// inline or behind an indirect reference; `None` means the document has
/// no interactive form at all.
pub fn process_catalog(
    src: &mut dyn Source,
    xref: &XrefTable,
    catalog: IndirectRef,
) -> SigResult<Option<ObjLocation>> {
    navigator::goto_obj(src, xref, catalog)?;
    lexer::skip_word(src, b"<<")?;

    let mut acroform: Option<ObjLocation> = None;
    let mut type_seen = false;

    while let Some(key) = navigator::parse_dict_key(src)? {
        match key {
            DictKey::Type => {
                let name = lexer::parse_name(src)?;
                if name != b"Catalog" {
                    return Err(SigError::content(format!(
                        "root object is /{} instead of /Catalog",
                        String::from_utf8_lossy(&name)
                    )));
                }
                type_seen = true;
            }
            DictKey::AcroForm => {
                lexer::skip_whitespace(src)?;
                if src.peek_byte()? == Some(b'<') {
                    // written inline, remember where it starts
                    acroform = Some(ObjLocation::Offset(src.pos()));
                    navigator::skip_dict_unknown_value(src)?;
                } else {
                    acroform = Some(ObjLocation::Reference(navigator::parse_indirect_ref(src)?));
                }
            }
            _ => navigator::skip_dict_unknown_value(src)?,
        }
    }

    if !type_seen {
        return Err(SigError::content("catalog has no /Type entry"));
    }

    Ok(acroform)
}

/// Reads the AcroForm dictionary: `SigFlags` and the `Fields` array.
pub fn process_acroform(
    src: &mut dyn Source,
    xref: &XrefTable,
    acroform: ObjLocation,
) -> SigResult<AcroformInfo> {
    navigator::goto_location(src, xref, acroform)?;
    lexer::skip_word(src, b"<<")?;

    let mut info = AcroformInfo::default();

    while let Some(key) = navigator::parse_dict_key(src)? {
        match key {
            DictKey::SigFlags => info.sig_flags = lexer::parse_number(src)?,
            DictKey::Fields => info.fields = parse_ref_array(src, xref)?,
            _ => navigator::skip_dict_unknown_value(src)?,
        }
    }

    debug!(
        "acroform: sig_flags {:#x}, {} field(s)",
        info.sig_flags,
        info.fields.len()
    );

    Ok(info)
}

/// Finds the first field of type `/Sig`, or `None` if no field is one.
pub fn find_sig_field(
    src: &mut dyn Source,
    xref: &XrefTable,
    fields: &[IndirectRef],
) -> SigResult<Option<IndirectRef>> {
    for &field in fields {
        navigator::goto_obj(src, xref, field)?;
        lexer::skip_word(src, b"<<")?;

        while let Some(key) = navigator::parse_dict_key(src)? {
            match key {
                DictKey::Ft => {
                    let name = lexer::parse_name(src)?;
                    if name == b"Sig" {
                        debug!("signature field {}", field);
                        return Ok(Some(field));
                    }
                }
                _ => navigator::skip_dict_unknown_value(src)?,
            }
        }
    }

    Ok(None)
}

/// Extracts `V` from the signature field: the reference to the signature
/// dictionary.
pub fn process_sig_field(
    src: &mut dyn Source,
    xref: &XrefTable,
    sig_field: IndirectRef,
) -> SigResult<IndirectRef> {
    navigator::goto_obj(src, xref, sig_field)?;
    lexer::skip_word(src, b"<<")?;

    let mut value: Option<IndirectRef> = None;

    while let Some(key) = navigator::parse_dict_key(src)? {
        match key {
            DictKey::V => value = Some(navigator::parse_indirect_ref(src)?),
            _ => navigator::skip_dict_unknown_value(src)?,
        }
    }

    value.ok_or_else(|| SigError::content("signature field has no V entry"))
}

/// Reads an array of indirect references, following one level of
/// indirection if the array itself is referenced.
fn parse_ref_array(src: &mut dyn Source, xref: &XrefTable) -> SigResult<Vec<IndirectRef>> {
    lexer::skip_whitespace(src)?;

    if src.peek_byte()? != Some(b'[') {
        let array_ref = navigator::parse_indirect_ref(src)?;
        let resume = src.pos();
        navigator::goto_obj(src, xref, array_ref)?;
        let refs = parse_ref_array_direct(src)?;
        src.seek(resume)?;
        return Ok(refs);
    }

    parse_ref_array_direct(src)
}

fn parse_ref_array_direct(src: &mut dyn Source) -> SigResult<Vec<IndirectRef>> {
    lexer::skip_word(src, b"[")?;

    let mut refs = Vec::new();
    loop {
        if lexer::skip_word(src, b"]").is_ok() {
            return Ok(refs);
        }
        refs.push(navigator::parse_indirect_ref(src)?);
    }
}
