use std::collections::TryReserveError;
use thiserror::Error;

/// Universal error type for signature verification.
///
/// The set of kinds is closed: every failure inside the crate maps onto
/// exactly one of these. The first error encountered terminates the
/// verification and is returned to the caller verbatim.
#[derive(Debug, Error)]
pub enum SigError {
    /// Programming error (missing source, bad arguments)
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),

    /// Underlying read failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural violation (missing header, bad xref, broken dictionary)
    #[error("malformed pdf: {what}{}", fmt_offset(.offset))]
    PdfMalformed { what: String, offset: Option<u64> },

    /// Semantic violation (missing required key, inconsistent ByteRange)
    #[error("invalid pdf content: {0}")]
    PdfContent(String),

    /// Well-formed PDF without any signature field
    #[error("document contains no signature")]
    NoSignature,

    /// Recognized but unimplemented feature
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    /// Digest mismatch or certificate chain validation failure
    #[error("cryptographic verification failed: {0}")]
    Crypto(String),

    /// Memory allocation failed
    #[error("allocation failed")]
    Alloc(#[from] TryReserveError),
}

fn fmt_offset(offset: &Option<u64>) -> String {
    match offset {
        Some(off) => format!(" at offset {}", off),
        None => String::new(),
    }
}

impl SigError {
    /// Creates a malformed-PDF error without positional context.
    pub fn malformed<S: Into<String>>(what: S) -> Self {
        SigError::PdfMalformed {
            what: what.into(),
            offset: None,
        }
    }

    /// Creates a malformed-PDF error pointing at a file offset.
    pub fn malformed_at<S: Into<String>>(what: S, offset: u64) -> Self {
        SigError::PdfMalformed {
            what: what.into(),
            offset: Some(offset),
        }
    }

    /// Creates a content error.
    pub fn content<S: Into<String>>(what: S) -> Self {
        SigError::PdfContent(what.into())
    }

    /// Creates a crypto error.
    pub fn crypto<S: Into<String>>(what: S) -> Self {
        SigError::Crypto(what.into())
    }

    /// Process exit code for the command-line front end.
    ///
    /// 1 = not verified, 2 = malformed or unsupported, 3 = I/O error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SigError::NoSignature | SigError::Crypto(_) => 1,
            SigError::Io(_) => 3,
            _ => 2,
        }
    }
}

/// Result type alias for verification operations
pub type SigResult<T> = Result<T, SigError>;
