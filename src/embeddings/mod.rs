//! External embedding capability. Used only at the service edges to turn a
//! `query_text` into a query vector; the reasoning core accepts vectors only.

pub mod openai;

pub use openai::OpenAIEmbedder;
