pub mod core;

// Re-export main types for convenience
pub use core::{
    BufferSource, Crypto, DigestSink, Document, FileSource, Header, IndirectRef, RsaSha1Verifier,
    SigError, SigResult, Signature, Source, SubFilter, Verdict, XrefEntry, XrefTable,
};
