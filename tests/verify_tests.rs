//! End-to-end verification scenarios over synthetic documents.

mod common;

use common::{MockCrypto, PdfBuilder, signed_pdf};
use pdf_sigcheck::{Document, SigError, SubFilter, Verdict};
use std::io::Write;

#[test]
fn verify_intact_document() {
    let pdf = signed_pdf();
    let mut doc = Document::from_bytes(pdf.bytes).unwrap();

    doc.verify(&MockCrypto::default(), &[]).unwrap();

    assert!(doc.verified());
    assert_eq!(doc.pdf_version(), Some((1, 4)));
    assert!(doc.signature_present());
    assert_eq!(doc.subfilter(), Some(&SubFilter::AdbeX509RsaSha1));
    assert_eq!(doc.cert_chain().len(), 1);
    assert_eq!(doc.digest_match(), Verdict::Ok);
    assert_eq!(doc.cert_chain_valid(), Verdict::Ok);
}

#[test]
fn verify_reports_header_fields() {
    let pdf = signed_pdf();
    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    doc.verify(&MockCrypto::default(), &[]).unwrap();

    let header = doc.header().unwrap();
    assert_eq!(header.start_offset, 0);
    assert!(doc.startxref() > 0);
}

#[test]
fn byte_flip_inside_covered_range_fails_digest() {
    let pdf = signed_pdf();
    let mut bytes = pdf.bytes.clone();
    let target = pdf.covered_payload_offset();
    bytes[target] ^= 0x01;

    let mut doc = Document::from_bytes(bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();

    assert!(matches!(err, SigError::Crypto(_)));
    assert_eq!(doc.digest_match(), Verdict::Fail);
    assert!(!doc.verified());
    assert!(doc.signature_present());
}

#[test]
fn byte_flip_in_gap_keeps_digest_intact() {
    let pdf = signed_pdf();
    let mut bytes = pdf.bytes.clone();
    // swap one whitespace byte of the gap for another
    let filler = pdf.gap_filler_offset();
    assert_eq!(bytes[filler], b'\n');
    bytes[filler] = b' ';

    let mut doc = Document::from_bytes(bytes).unwrap();
    doc.verify(&MockCrypto::default(), &[]).unwrap();
    assert_eq!(doc.digest_match(), Verdict::Ok);
    assert!(doc.verified());
}

#[test]
fn unsupported_subfilter_parses_but_does_not_verify() {
    let pdf = PdfBuilder {
        subfilter: "adbe.pkcs7.detached",
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();

    assert!(matches!(err, SigError::Unsupported(_)));
    assert!(doc.signature_present());
    assert_eq!(
        doc.subfilter(),
        Some(&SubFilter::Unknown("adbe.pkcs7.detached".to_string()))
    );
    assert_eq!(doc.digest_match(), Verdict::Unchecked);
}

#[test]
fn untrusted_chain_fails_after_digest_passes() {
    let pdf = signed_pdf();
    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc
        .verify(&MockCrypto { chain_ok: false }, &[])
        .unwrap_err();

    assert!(matches!(err, SigError::Crypto(_)));
    assert_eq!(doc.digest_match(), Verdict::Ok);
    assert_eq!(doc.cert_chain_valid(), Verdict::Fail);
    assert!(!doc.verified());
}

#[test]
fn cert_array_builds_full_chain() {
    let pdf = PdfBuilder {
        certs: vec!["30820122", "30820123", "30820124"],
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    doc.verify(&MockCrypto::default(), &[]).unwrap();
    assert_eq!(doc.cert_chain().len(), 3);
}

#[test]
fn sig_flags_clear_means_no_signature() {
    let pdf = PdfBuilder {
        sig_flags: 0,
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::NoSignature));
    assert!(!doc.signature_present());
}

#[test]
fn missing_acroform_means_no_signature() {
    let pdf = PdfBuilder {
        with_acroform: false,
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::NoSignature));
}

#[test]
fn no_sig_typed_field_means_no_signature() {
    let pdf = PdfBuilder {
        sig_field_type: "Tx",
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::NoSignature));
}

#[test]
fn empty_contents_is_malformed() {
    let pdf = PdfBuilder {
        empty_contents: true,
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::PdfMalformed { .. }));
}

#[test]
fn empty_byte_range_is_malformed() {
    let pdf = PdfBuilder {
        empty_byte_range: true,
        ..PdfBuilder::default()
    }
    .build();

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::PdfMalformed { .. }));
}

#[test]
fn verifying_twice_yields_identical_results() {
    let pdf = signed_pdf();

    let mut first = Document::from_bytes(pdf.bytes.clone()).unwrap();
    first.verify(&MockCrypto::default(), &[]).unwrap();

    let mut second = Document::from_bytes(pdf.bytes).unwrap();
    second.verify(&MockCrypto::default(), &[]).unwrap();

    assert_eq!(first.pdf_version(), second.pdf_version());
    assert_eq!(first.startxref(), second.startxref());
    assert_eq!(first.digest_match(), second.digest_match());
    assert_eq!(first.cert_chain_valid(), second.cert_chain_valid());
    assert_eq!(
        first.signature().unwrap().byte_range.pairs(),
        second.signature().unwrap().byte_range.pairs()
    );
}

#[test]
fn a_document_verifies_only_once() {
    let pdf = signed_pdf();
    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    doc.verify(&MockCrypto::default(), &[]).unwrap();

    let err = doc.verify(&MockCrypto::default(), &[]).unwrap_err();
    assert!(matches!(err, SigError::BadParameter(_)));
    // the recorded outcome is untouched
    assert!(doc.verified());
}

#[test]
fn file_and_buffer_sources_agree() {
    let pdf = signed_pdf();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&pdf.bytes).unwrap();
    file.flush().unwrap();

    let mut from_file = Document::from_path(file.path()).unwrap();
    from_file.verify(&MockCrypto::default(), &[]).unwrap();

    let mut from_buffer = Document::from_bytes(pdf.bytes).unwrap();
    from_buffer.verify(&MockCrypto::default(), &[]).unwrap();

    assert_eq!(from_file.verified(), from_buffer.verified());
    assert_eq!(from_file.pdf_version(), from_buffer.pdf_version());
    assert_eq!(from_file.startxref(), from_buffer.startxref());
    assert_eq!(from_file.digest_match(), from_buffer.digest_match());
}

#[test]
fn byte_range_covers_everything_but_the_gap() {
    let pdf = signed_pdf();
    let len = pdf.bytes.len() as u64;

    let mut doc = Document::from_bytes(pdf.bytes).unwrap();
    doc.verify(&MockCrypto::default(), &[]).unwrap();

    let range = &doc.signature().unwrap().byte_range;
    let pairs = range.pairs();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, 0);
    assert_eq!(pairs[1].0 + pairs[1].1, len);
    // the gap is exactly the Contents token plus its trailing filler
    let gap = pairs[1].0 - (pairs[0].0 + pairs[0].1);
    assert_eq!(
        gap as usize,
        (pdf.contents_end - pdf.contents_start) + 1
    );
}
