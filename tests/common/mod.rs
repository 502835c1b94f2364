//! Shared helpers: a synthetic signed-PDF builder and a mock crypto
//! provider.
//!
//! The builder emits a complete classic-xref PDF whose `Contents` entry
//! holds the SHA-1 digest of the covered byte ranges, hex-encoded. The
//! mock provider then treats a signature blob as valid exactly when it
//! equals the recomputed digest, which makes end-to-end digest behavior
//! testable without key material.

use pdf_sigcheck::{Crypto, DigestSink, SigResult};
use sha1::{Digest, Sha1};

pub struct MockCrypto {
    pub chain_ok: bool,
}

impl Default for MockCrypto {
    fn default() -> Self {
        MockCrypto { chain_ok: true }
    }
}

struct MockSink(Sha1);

impl DigestSink for MockSink {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

impl Crypto for MockCrypto {
    fn begin_digest(&self) -> Box<dyn DigestSink> {
        Box::new(MockSink(Sha1::new()))
    }

    fn verify_signature(
        &self,
        _signer_der: &[u8],
        digest: &[u8],
        signature: &[u8],
    ) -> SigResult<bool> {
        Ok(signature == digest)
    }

    fn verify_chain(&self, chain_der: &[Vec<u8>], _anchors_der: &[Vec<u8>]) -> SigResult<bool> {
        Ok(self.chain_ok && !chain_der.is_empty())
    }
}

/// Options for the synthetic document.
pub struct PdfBuilder {
    pub subfilter: &'static str,
    pub sig_flags: u64,
    pub certs: Vec<&'static str>,
    pub with_acroform: bool,
    pub sig_field_type: &'static str,
    pub empty_contents: bool,
    pub empty_byte_range: bool,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        PdfBuilder {
            subfilter: "adbe.x509.rsa_sha1",
            sig_flags: 1,
            certs: vec!["308201223082"],
            with_acroform: true,
            sig_field_type: "Sig",
            empty_contents: false,
            empty_byte_range: false,
        }
    }
}

/// The assembled file plus the offsets tests poke at.
pub struct BuiltPdf {
    pub bytes: Vec<u8>,
    /// Offset of the `<` opening `Contents`
    pub contents_start: usize,
    /// One past the `>` closing `Contents`
    pub contents_end: usize,
}

impl BuiltPdf {
    /// A byte inside the ByteRange gap but outside the `<...>` token
    /// itself. Flipping it to another whitespace byte must not disturb
    /// parsing or the digest.
    pub fn gap_filler_offset(&self) -> usize {
        self.contents_end
    }

    /// A byte inside the first covered range whose value does not affect
    /// parsing (it sits in a string literal).
    pub fn covered_payload_offset(&self) -> usize {
        self.bytes
            .windows(10)
            .position(|w| w == b"Signature1")
            .expect("payload marker")
    }
}

impl PdfBuilder {
    pub fn build(self) -> BuiltPdf {
        const DIGEST_HEX_LEN: usize = 40;

        let mut data: Vec<u8> = Vec::new();
        let mut offsets = [0usize; 5];

        data.extend_from_slice(b"%PDF-1.4\n");

        offsets[1] = data.len();
        if self.with_acroform {
            data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /AcroForm 2 0 R >>\nendobj\n");
        } else {
            data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        }

        offsets[2] = data.len();
        data.extend_from_slice(
            format!(
                "2 0 obj\n<< /SigFlags {} /Fields [ 3 0 R ] >>\nendobj\n",
                self.sig_flags
            )
            .as_bytes(),
        );

        offsets[3] = data.len();
        data.extend_from_slice(
            format!(
                "3 0 obj\n<< /FT /{} /T (Signature1) /V 4 0 R >>\nendobj\n",
                self.sig_field_type
            )
            .as_bytes(),
        );

        offsets[4] = data.len();
        data.extend_from_slice(
            format!(
                "4 0 obj\n<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /{} ",
                self.subfilter
            )
            .as_bytes(),
        );
        match self.certs.len() {
            0 => {}
            1 => data.extend_from_slice(format!("/Cert <{}> ", self.certs[0]).as_bytes()),
            _ => {
                data.extend_from_slice(b"/Cert [ ");
                for cert in &self.certs {
                    data.extend_from_slice(format!("<{}> ", cert).as_bytes());
                }
                data.extend_from_slice(b"] ");
            }
        }

        data.extend_from_slice(b"/Contents ");
        let contents_start = data.len();
        data.push(b'<');
        if !self.empty_contents {
            data.extend_from_slice(&[b'0'; DIGEST_HEX_LEN]);
        }
        data.push(b'>');
        let contents_end = data.len();
        data.push(b'\n');

        let mut br_field = None;
        if self.empty_byte_range {
            data.extend_from_slice(b"/ByteRange [] >>\nendobj\n");
        } else {
            data.extend_from_slice(b"/ByteRange [");
            br_field = Some(data.len());
            data.extend_from_slice(format!("{:010} {:010} {:010} {:010}", 0, 0, 0, 0).as_bytes());
            data.extend_from_slice(b"] >>\nendobj\n");
        }

        let xref_at = data.len();
        data.extend_from_slice(b"xref\n0 5\n");
        data.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets[1..] {
            data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        data.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        data.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_at).as_bytes());

        // second pass: the file length is now known, splice the real
        // ByteRange values and the digest into the placeholders
        let file_len = data.len();
        let gap_end = contents_end + 1;

        if let Some(field) = br_field {
            let nums = format!(
                "{:010} {:010} {:010} {:010}",
                0,
                contents_start,
                gap_end,
                file_len - gap_end
            );
            data[field..field + nums.len()].copy_from_slice(nums.as_bytes());
        }

        if !self.empty_contents {
            let mut hasher = Sha1::new();
            Digest::update(&mut hasher, &data[..contents_start]);
            Digest::update(&mut hasher, &data[gap_end..]);
            let digest_hex = hex::encode(hasher.finalize());
            assert_eq!(digest_hex.len(), DIGEST_HEX_LEN);
            data[contents_start + 1..contents_start + 1 + DIGEST_HEX_LEN]
                .copy_from_slice(digest_hex.as_bytes());
        }

        BuiltPdf {
            bytes: data,
            contents_start,
            contents_end,
        }
    }
}

/// Shorthand for the default, correctly signed document.
pub fn signed_pdf() -> BuiltPdf {
    PdfBuilder::default().build()
}
