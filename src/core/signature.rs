//! Signature dictionary parsing and the extracted signature record.

use super::error::{SigError, SigResult};
use super::lexer;
use super::navigator::{self, DictKey, IndirectRef};
use super::source::Source;
use super::xref::XrefTable;
use log::warn;
use smallvec::SmallVec;

/// Names the signature encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubFilter {
    /// PKCS#1 RSA signature over a SHA-1 digest of the byte ranges
    AdbeX509RsaSha1,
    /// Recognized name that this verifier does not implement
    Unknown(String),
}

impl SubFilter {
    pub fn from_name(name: &[u8]) -> Self {
        if name == b"adbe.x509.rsa_sha1" {
            SubFilter::AdbeX509RsaSha1
        } else {
            SubFilter::Unknown(String::from_utf8_lossy(name).into_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubFilter::AdbeX509RsaSha1 => "adbe.x509.rsa_sha1",
            SubFilter::Unknown(name) => name,
        }
    }
}

/// One certificate as it appears in the `Cert` entry: the raw hex body,
/// decoded to DER on demand.
#[derive(Debug, Clone)]
pub struct Certificate {
    hex: Vec<u8>,
}

impl Certificate {
    pub fn from_hex(hex: Vec<u8>) -> Self {
        Certificate { hex }
    }

    /// The hex body exactly as written in the file.
    pub fn hex(&self) -> &[u8] {
        &self.hex
    }

    /// Decodes the body to DER bytes.
    pub fn der(&self) -> SigResult<Vec<u8>> {
        lexer::decode_hex(&self.hex)
    }
}

/// Ordered `(start, length)` pairs of file bytes covered by the digest.
///
/// Conventionally two pairs covering everything except the hex `Contents`
/// placeholder.
#[derive(Debug, Clone, Default)]
pub struct ByteRange {
    pairs: SmallVec<[(u64, u64); 2]>,
}

impl ByteRange {
    pub fn push(&mut self, start: u64, length: u64) {
        self.pairs.push((start, length));
    }

    pub fn pairs(&self) -> &[(u64, u64)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Total number of bytes covered.
    pub fn covered_len(&self) -> u64 {
        self.pairs.iter().map(|(_, len)| len).sum()
    }

    /// Checks the constraints that must hold before the ranges are
    /// trusted for digesting.
    ///
    /// Pairs must be non-empty, each of positive length and inside the
    /// file, in ascending order without overlap, and the literal hex
    /// `Contents` token (`contents_span`, brackets included) must lie
    /// entirely inside a gap between two consecutive pairs.
    pub fn validate(&self, file_len: u64, contents_span: (u64, u64)) -> SigResult<()> {
        if self.pairs.is_empty() {
            return Err(SigError::malformed("ByteRange is empty"));
        }

        let mut prev_end: Option<u64> = None;
        for &(start, length) in self.pairs.iter() {
            if length == 0 {
                return Err(SigError::malformed("ByteRange pair of zero length"));
            }
            let end = start
                .checked_add(length)
                .ok_or_else(|| SigError::malformed("ByteRange pair overflows"))?;
            if end > file_len {
                return Err(SigError::malformed(format!(
                    "ByteRange pair [{} {}] exceeds file size {}",
                    start, length, file_len
                )));
            }
            if let Some(prev) = prev_end {
                if start < prev {
                    return Err(SigError::malformed(
                        "ByteRange pairs overlap or are out of order",
                    ));
                }
            }
            prev_end = Some(end);
        }

        let (c_start, c_end) = contents_span;
        let in_gap = self.pairs.windows(2).any(|w| {
            let gap_start = w[0].0 + w[0].1;
            let gap_end = w[1].0;
            gap_start <= c_start && c_end <= gap_end
        });
        if !in_gap {
            return Err(SigError::malformed(
                "Contents does not lie in a ByteRange gap",
            ));
        }

        Ok(())
    }
}

/// The extracted signature record.
#[derive(Debug, Clone)]
pub struct Signature {
    pub subfilter: SubFilter,
    /// First is the signing certificate, the rest are intermediates
    pub certs: Vec<Certificate>,
    /// Signature blob hex, verbatim
    pub contents_hex: Vec<u8>,
    pub byte_range: ByteRange,
    /// Where the signature dictionary begins
    pub dict_offset: u64,
    /// Span of the `<...>` Contents token, brackets included
    pub contents_span: (u64, u64),
}

impl Signature {
    /// Decodes the `Contents` hex to the raw signature blob.
    pub fn contents_der(&self) -> SigResult<Vec<u8>> {
        lexer::decode_hex(&self.contents_hex)
    }
}

/// Parses the signature dictionary behind `V`.
///
/// Unknown keys are skipped; `SubFilter`, `Contents` and `ByteRange` are
/// required. An unrecognized subfilter parses fine and is rejected only
/// at verify time.
pub fn parse_sig_dict(
    src: &mut dyn Source,
    xref: &XrefTable,
    sig_dict: IndirectRef,
) -> SigResult<Signature> {
    navigator::goto_obj(src, xref, sig_dict)?;
    lexer::skip_whitespace(src)?;
    let dict_offset = src.pos();
    lexer::skip_word(src, b"<<")?;

    let mut subfilter: Option<SubFilter> = None;
    let mut certs: Vec<Certificate> = Vec::new();
    let mut contents: Option<(Vec<u8>, (u64, u64))> = None;
    let mut byte_range: Option<ByteRange> = None;

    while let Some(key) = navigator::parse_dict_key(src)? {
        match key {
            DictKey::SubFilter => {
                let name = lexer::parse_name(src)?;
                let parsed = SubFilter::from_name(&name);
                if let SubFilter::Unknown(ref name) = parsed {
                    warn!("unsupported signature subfilter /{}", name);
                }
                subfilter = Some(parsed);
            }
            DictKey::Cert => certs = parse_certs(src)?,
            DictKey::Contents => {
                lexer::skip_whitespace(src)?;
                let start = src.pos();
                let hex = lexer::parse_hex_string(src)?;
                contents = Some((hex, (start, src.pos())));
            }
            DictKey::ByteRange => byte_range = Some(parse_byte_range(src)?),
            _ => navigator::skip_dict_unknown_value(src)?,
        }
    }

    let subfilter =
        subfilter.ok_or_else(|| SigError::content("signature dictionary has no SubFilter"))?;
    let (contents_hex, contents_span) =
        contents.ok_or_else(|| SigError::content("signature dictionary has no Contents"))?;
    let byte_range =
        byte_range.ok_or_else(|| SigError::content("signature dictionary has no ByteRange"))?;

    Ok(Signature {
        subfilter,
        certs,
        contents_hex,
        byte_range,
        dict_offset,
        contents_span,
    })
}

/// Parses the `Cert` value: a single hex string, or an array of them with
/// the signing certificate first.
fn parse_certs(src: &mut dyn Source) -> SigResult<Vec<Certificate>> {
    lexer::skip_whitespace(src)?;

    let mut certs = Vec::new();

    if src.peek_byte()? == Some(b'[') {
        src.skip(1)?;
        loop {
            lexer::skip_whitespace(src)?;
            match src.peek_byte()? {
                None => {
                    return Err(SigError::malformed_at("unterminated Cert array", src.pos()));
                }
                Some(b']') => {
                    src.skip(1)?;
                    break;
                }
                Some(_) => certs.push(Certificate::from_hex(lexer::parse_hex_string(src)?)),
            }
        }
    } else {
        certs.push(Certificate::from_hex(lexer::parse_hex_string(src)?));
    }

    if certs.is_empty() {
        return Err(SigError::content("Cert array is empty"));
    }

    Ok(certs)
}

/// Parses `ByteRange`: `[ s1 l1 s2 l2 ... ]`.
fn parse_byte_range(src: &mut dyn Source) -> SigResult<ByteRange> {
    lexer::skip_word(src, b"[")?;

    let mut range = ByteRange::default();
    loop {
        if lexer::skip_word(src, b"]").is_ok() {
            return Ok(range);
        }
        let start = lexer::parse_number(src)?;
        let length = lexer::parse_number(src)?;
        range.push(start, length);
    }
}
