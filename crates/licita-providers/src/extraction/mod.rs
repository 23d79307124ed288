//! Text Extraction Engines (spec C8 / §4.8): a markdown/plain-text/HTML
//! converter plus a two-tier PDF chain, mirroring the multi-engine
//! fallback the RAG pipeline historically relied on — try the capable
//! engine first, fall through to a cruder one rather than fail outright.

mod markdown;
mod pdf_primary;
mod pdf_raw_stream;

pub use markdown::MarkdownConverter;
pub use pdf_primary::PdfPrimaryEngine;
pub use pdf_raw_stream::PdfRawStreamEngine;
