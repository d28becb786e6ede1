//! Docchat Ingest - Document text extraction and chunking
//!
//! Turns an uploaded file into indexable text:
//! - `extract` detects the document kind and pulls plain text out of
//!   PDF, Markdown, and plain-text files
//! - `chunker` splits extracted text into bounded, overlapping segments
//!   suitable for embedding and retrieval

pub mod chunker;
pub mod extract;

pub use chunker::TextChunker;
pub use extract::{detect_kind, extract_text};
