pub mod buffer_source;
pub mod crypto;
pub mod document;
pub mod error;
pub mod file_source;
pub mod lexer;
pub mod navigator;
pub mod signature;
pub mod source;
pub mod walker;
pub mod xref;

pub use buffer_source::BufferSource;
pub use crypto::{Crypto, DigestSink, RsaSha1Verifier};
pub use document::{Document, HEADER_SEARCH_OFFSET, Header, Verdict};
pub use error::{SigError, SigResult};
pub use file_source::FileSource;
pub use navigator::{DictKey, IndirectRef, ObjLocation};
pub use signature::{ByteRange, Certificate, Signature, SubFilter};
pub use source::Source;
pub use xref::{MAX_FILE_UPDATES, XREF_SEARCH_OFFSET, XrefEntry, XrefKind, XrefTable};
