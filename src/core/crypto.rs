//! The boundary to cryptographic primitives.
//!
//! The verifier never touches hash functions, RSA or X.509 directly; it
//! talks to a [`Crypto`] implementation. [`RsaSha1Verifier`] is the
//! stock implementation for `adbe.x509.rsa_sha1` signatures; tests
//! substitute their own.

use super::error::{SigError, SigResult};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use x509_parser::prelude::{FromDer, X509Certificate};

/// A running message digest fed with the signed byte ranges.
pub trait DigestSink {
    fn update(&mut self, data: &[u8]);
    fn finish(self: Box<Self>) -> Vec<u8>;
}

/// Cryptographic collaborator of the verifier.
///
/// All methods take certificates as DER bytes; decoding is the
/// implementation's business. `verify_signature` and `verify_chain`
/// answer yes/no; structural failures (undecodable certificate, wrong
/// key type) surface as [`SigError::Crypto`].
pub trait Crypto {
    /// Starts the digest matching the supported subfilter.
    fn begin_digest(&self) -> Box<dyn DigestSink>;

    /// Verifies `signature` over `digest` with the signing certificate's
    /// public key.
    fn verify_signature(
        &self,
        signer_der: &[u8],
        digest: &[u8],
        signature: &[u8],
    ) -> SigResult<bool>;

    /// Validates the certificate chain (signing certificate first)
    /// against a set of trust anchors.
    fn verify_chain(&self, chain_der: &[Vec<u8>], anchors_der: &[Vec<u8>]) -> SigResult<bool>;
}

/// SHA-1 / RSA PKCS#1 v1.5 implementation backing `adbe.x509.rsa_sha1`.
#[derive(Debug, Default)]
pub struct RsaSha1Verifier;

struct Sha1Sink {
    hasher: Sha1,
}

impl DigestSink for Sha1Sink {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.hasher, data);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

fn parse_cert(der: &[u8]) -> SigResult<X509Certificate<'_>> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| SigError::crypto(format!("cannot decode certificate: {}", e)))?;
    Ok(cert)
}

impl Crypto for RsaSha1Verifier {
    fn begin_digest(&self) -> Box<dyn DigestSink> {
        Box::new(Sha1Sink {
            hasher: Sha1::new(),
        })
    }

    fn verify_signature(
        &self,
        signer_der: &[u8],
        digest: &[u8],
        signature: &[u8],
    ) -> SigResult<bool> {
        let cert = parse_cert(signer_der)?;
        let spki = cert.public_key();

        let key = RsaPublicKey::from_pkcs1_der(&spki.subject_public_key.data)
            .map_err(|e| SigError::crypto(format!("not an RSA public key: {}", e)))?;

        Ok(key
            .verify(Pkcs1v15Sign::new::<Sha1>(), digest, signature)
            .is_ok())
    }

    fn verify_chain(&self, chain_der: &[Vec<u8>], anchors_der: &[Vec<u8>]) -> SigResult<bool> {
        if chain_der.is_empty() {
            return Ok(false);
        }

        let mut chain = Vec::with_capacity(chain_der.len());
        for der in chain_der {
            chain.push(parse_cert(der)?);
        }

        // each link must be issued and signed by the next
        for pair in chain.windows(2) {
            let (child, issuer) = (&pair[0], &pair[1]);
            if child.issuer().as_raw() != issuer.subject().as_raw() {
                return Ok(false);
            }
            if child.verify_signature(Some(issuer.public_key())).is_err() {
                return Ok(false);
            }
        }

        // the chain top must itself be an anchor, or be signed by one
        let Some(top) = chain.last() else {
            return Ok(false);
        };
        let Some(top_der) = chain_der.last() else {
            return Ok(false);
        };

        if anchors_der.iter().any(|a| a == top_der) {
            return Ok(true);
        }

        for anchor_der in anchors_der {
            let anchor = parse_cert(anchor_der)?;
            if top.issuer().as_raw() == anchor.subject().as_raw()
                && top.verify_signature(Some(anchor.public_key())).is_ok()
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
