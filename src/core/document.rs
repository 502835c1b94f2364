//! The incremental-update aware document model.
//!
//! A `Document` owns its source and carries everything extracted from it:
//! header version, xref table, the traversal references and the signature
//! record, plus the two verification verdicts.

use super::buffer_source::BufferSource;
use super::crypto::Crypto;
use super::error::{SigError, SigResult};
use super::file_source::FileSource;
use super::navigator::{IndirectRef, ObjLocation};
use super::signature::{self, ByteRange, Certificate, Signature, SubFilter};
use super::source::Source;
use super::walker;
use super::xref::{self, MAX_FILE_UPDATES, XrefTable};
use log::debug;
use std::fs::File;
use std::path::Path;

/// How many junk bytes may precede the `%PDF-X.Y` header.
pub const HEADER_SEARCH_OFFSET: u64 = 1024;

/// Chunk size used when streaming the signed ranges through the digest.
const DIGEST_CHUNK: usize = 64 * 1024;

/// Outcome of one verification aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unchecked,
    Ok,
    Fail,
}

/// The parsed `%PDF-X.Y` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub pdf_x: u8,
    pub pdf_y: u8,
    /// Byte offset of `%PDF-` within the file
    pub start_offset: u64,
}

/// Document lifecycle. Transitions are one-way; a failed document is
/// discarded and a fresh one opened to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
    Fresh,
    SourceSet,
    Parsed,
    Verified,
    Failed,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("state", &self.state)
            .field("max_updates", &self.max_updates)
            .finish()
    }
}

pub struct Document {
    state: DocState,
    source: Option<Box<dyn Source>>,
    max_updates: usize,

    header: Option<Header>,
    startxref: u64,
    xref: Option<XrefTable>,

    catalog: Option<IndirectRef>,
    acroform: Option<ObjLocation>,
    sig_field: Option<IndirectRef>,
    sig_dict: Option<IndirectRef>,
    sig_flags: u64,

    signature: Option<Signature>,
    digest_match: Verdict,
    cert_chain: Verdict,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// Creates an empty document awaiting a source.
    pub fn new() -> Self {
        Document {
            state: DocState::Fresh,
            source: None,
            max_updates: MAX_FILE_UPDATES,
            header: None,
            startxref: 0,
            xref: None,
            catalog: None,
            acroform: None,
            sig_field: None,
            sig_dict: None,
            sig_flags: 0,
            signature: None,
            digest_match: Verdict::Unchecked,
            cert_chain: Verdict::Unchecked,
        }
    }

    /// Attaches the PDF source. Allowed exactly once.
    pub fn set_source(&mut self, source: Box<dyn Source>) -> SigResult<()> {
        if self.state != DocState::Fresh {
            return Err(SigError::BadParameter("document already has a source"));
        }
        if source.is_empty() {
            return Err(SigError::BadParameter("source is empty"));
        }
        self.source = Some(source);
        self.state = DocState::SourceSet;
        Ok(())
    }

    /// Opens a document over an in-memory byte buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> SigResult<Self> {
        let mut doc = Document::new();
        doc.set_source(Box::new(BufferSource::new(bytes)))?;
        Ok(doc)
    }

    /// Opens a document over an already-open read-only file handle.
    pub fn from_file(file: File) -> SigResult<Self> {
        let mut doc = Document::new();
        doc.set_source(Box::new(FileSource::from_file(file)?))?;
        Ok(doc)
    }

    /// Opens a document from a file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> SigResult<Self> {
        let mut doc = Document::new();
        doc.set_source(Box::new(FileSource::open(path)?))?;
        Ok(doc)
    }

    /// Overrides the bound on incremental updates walked through `Prev`
    /// links.
    pub fn set_max_updates(&mut self, max_updates: usize) {
        self.max_updates = max_updates;
    }

    /// Runs the whole verification: header, xref chain, traversal,
    /// signature extraction, digest comparison and chain validation.
    ///
    /// `trust_anchors` are DER certificates the chain may terminate at.
    /// On success the document is `Verified`; any error moves it to the
    /// failed state and is returned verbatim.
    pub fn verify(&mut self, crypto: &dyn Crypto, trust_anchors: &[Vec<u8>]) -> SigResult<()> {
        if self.state != DocState::SourceSet {
            return Err(SigError::BadParameter(
                "verify requires a document with a fresh source",
            ));
        }

        let mut source = self
            .source
            .take()
            .ok_or(SigError::BadParameter("document has no source"))?;

        let outcome = self.run_verify(source.as_mut(), crypto, trust_anchors);
        self.source = Some(source);

        match outcome {
            Ok(()) => {
                self.state = DocState::Verified;
                Ok(())
            }
            Err(err) => {
                self.state = DocState::Failed;
                Err(err)
            }
        }
    }

    fn run_verify(
        &mut self,
        src: &mut dyn Source,
        crypto: &dyn Crypto,
        trust_anchors: &[Vec<u8>],
    ) -> SigResult<()> {
        let header = process_header(src)?;
        debug!(
            "pdf {}.{} starting at offset {}",
            header.pdf_x, header.pdf_y, header.start_offset
        );
        self.header = Some(header);

        self.startxref = xref::read_startxref(src)?;
        let (table, catalog) = xref::resolve(src, self.startxref, self.max_updates)?;
        self.catalog = Some(catalog);

        // keep the resolved table around even when the walk below stops
        // early, so callers can still inspect it
        let extraction = self.extract_signature(src, &table, catalog);
        self.xref = Some(table);

        let sig = extraction?;
        self.signature = Some(sig.clone());
        self.state = DocState::Parsed;

        if sig.contents_hex.is_empty() {
            return Err(SigError::malformed("Contents is empty"));
        }
        sig.byte_range.validate(src.len(), sig.contents_span)?;

        match sig.subfilter {
            SubFilter::AdbeX509RsaSha1 => {}
            SubFilter::Unknown(_) => {
                return Err(SigError::Unsupported("signature subfilter"));
            }
        }

        let signer = sig
            .certs
            .first()
            .ok_or_else(|| SigError::content("signature dictionary has no Cert"))?;
        let signer_der = signer.der()?;
        let contents = sig.contents_der()?;

        let digest = digest_byte_ranges(src, &sig.byte_range, crypto)?;

        let digest_ok = crypto.verify_signature(&signer_der, &digest, &contents)?;
        self.digest_match = if digest_ok { Verdict::Ok } else { Verdict::Fail };
        if !digest_ok {
            return Err(SigError::crypto("digest does not match signature"));
        }

        let mut chain_der = Vec::with_capacity(sig.certs.len());
        for cert in &sig.certs {
            chain_der.push(cert.der()?);
        }
        let chain_ok = crypto.verify_chain(&chain_der, trust_anchors)?;
        self.cert_chain = if chain_ok { Verdict::Ok } else { Verdict::Fail };
        if !chain_ok {
            return Err(SigError::crypto("certificate chain is not trusted"));
        }

        Ok(())
    }

    /// Walks catalog → AcroForm → signature field and parses the
    /// signature dictionary.
    fn extract_signature(
        &mut self,
        src: &mut dyn Source,
        table: &XrefTable,
        catalog: IndirectRef,
    ) -> SigResult<Signature> {
        let acroform =
            walker::process_catalog(src, table, catalog)?.ok_or(SigError::NoSignature)?;
        self.acroform = Some(acroform);

        let form = walker::process_acroform(src, table, acroform)?;
        self.sig_flags = form.sig_flags;
        if !form.signatures_exist() {
            return Err(SigError::NoSignature);
        }

        let sig_field =
            walker::find_sig_field(src, table, &form.fields)?.ok_or(SigError::NoSignature)?;
        self.sig_field = Some(sig_field);

        let sig_dict = walker::process_sig_field(src, table, sig_field)?;
        self.sig_dict = Some(sig_dict);

        signature::parse_sig_dict(src, table, sig_dict)
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    /// PDF version from the header, as `(major, minor)`.
    pub fn pdf_version(&self) -> Option<(u8, u8)> {
        self.header.map(|h| (h.pdf_x, h.pdf_y))
    }

    pub fn header(&self) -> Option<Header> {
        self.header
    }

    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    pub fn xref(&self) -> Option<&XrefTable> {
        self.xref.as_ref()
    }

    /// True once a signature dictionary has been extracted.
    pub fn signature_present(&self) -> bool {
        self.signature.is_some()
    }

    pub fn subfilter(&self) -> Option<&SubFilter> {
        self.signature.as_ref().map(|s| &s.subfilter)
    }

    /// The certificates from the signature, signing certificate first.
    pub fn cert_chain(&self) -> &[Certificate] {
        self.signature.as_ref().map_or(&[], |s| s.certs.as_slice())
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn digest_match(&self) -> Verdict {
        self.digest_match
    }

    pub fn cert_chain_valid(&self) -> Verdict {
        self.cert_chain
    }

    /// Overall result: both the digest comparison and the chain
    /// validation came out clean.
    pub fn verified(&self) -> bool {
        self.digest_match == Verdict::Ok && self.cert_chain == Verdict::Ok
    }
}

/// Locates and parses the `%PDF-X.Y` header.
///
/// Files may carry up to [`HEADER_SEARCH_OFFSET`] bytes of junk before
/// the magic; the scan resynchronizes on every `%` so overlapping
/// near-matches are handled.
pub fn process_header(src: &mut dyn Source) -> SigResult<Header> {
    const MAGIC: &[u8; 5] = b"%PDF-";

    src.seek(0)?;

    let mut offset: u64 = 0;
    let mut found: u64 = 0;
    let mut pdf_x = 0u8;
    let mut pdf_y = 0u8;

    while found < 8 {
        if offset.saturating_sub(found) > HEADER_SEARCH_OFFSET {
            return Err(SigError::malformed("pdf header not found"));
        }

        let ch = match src.peek_byte()? {
            Some(ch) => ch,
            None => return Err(SigError::malformed("pdf header not found")),
        };
        src.skip(1)?;
        offset += 1;

        match found {
            0..=4 => {
                if ch == MAGIC[found as usize] {
                    found += 1;
                } else if ch == b'%' {
                    found = 1;
                } else {
                    found = 0;
                }
            }
            5 => {
                if ch.is_ascii_digit() {
                    pdf_x = ch - b'0';
                    found = 6;
                } else if ch == b'%' {
                    found = 1;
                } else {
                    found = 0;
                }
            }
            6 => {
                if ch == b'.' {
                    found = 7;
                } else if ch == b'%' {
                    found = 1;
                } else {
                    found = 0;
                }
            }
            _ => {
                if ch.is_ascii_digit() {
                    pdf_y = ch - b'0';
                    found = 8;
                } else if ch == b'%' {
                    found = 1;
                } else {
                    found = 0;
                }
            }
        }
    }

    Ok(Header {
        pdf_x,
        pdf_y,
        start_offset: offset - 8,
    })
}

/// Streams the covered byte ranges through a fresh digest, in fixed-size
/// chunks so the signed region is never held in memory at once.
fn digest_byte_ranges(
    src: &mut dyn Source,
    range: &ByteRange,
    crypto: &dyn Crypto,
) -> SigResult<Vec<u8>> {
    let mut sink = crypto.begin_digest();

    let mut chunk = Vec::new();
    chunk.try_reserve_exact(DIGEST_CHUNK)?;
    chunk.resize(DIGEST_CHUNK, 0);

    for &(start, length) in range.pairs() {
        src.seek(start)?;
        let mut remaining = length;
        while remaining > 0 {
            let take = remaining.min(DIGEST_CHUNK as u64) as usize;
            src.read_exact(&mut chunk[..take])?;
            sink.update(&chunk[..take]);
            remaining -= take as u64;
        }
    }

    Ok(sink.finish())
}
