//! Grounded Q&A over local documents.
//!
//! groundsmith implements a minimal retrieval-augmented generation loop:
//! documents are split into deterministic, overlapping chunks, embedded, and
//! upserted into a vector store under stable ids; at query time the most
//! similar chunks are retrieved, packed into a budgeted context, and rendered
//! into a grounded prompt that a streaming language model answers.
//!
//! ```text
//! Index path:
//!   docs ──► ingestion::DocumentSource ──► chunker ──► indexer::IndexWriter ──► stores::VectorStore
//!                                                            │
//!                                          embeddings::EmbeddingProvider
//!
//! Query path:
//!   query ──► retriever::Retriever ──► context::ContextAssembler ──► generation::Generator
//!                                                                        │
//!                                             session::QuerySession ◄────┘ (streamed answer)
//! ```
//!
//! External systems (document text extraction, the embedding model, the
//! vector database, the language model) sit behind narrow traits so the
//! pipeline logic stays independent of any particular backend. The shipped
//! backends are a directory walker for plain-text files, Ollama HTTP clients
//! for embeddings and chat, and a SQLite store built on `sqlite-vec`.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod generation;
pub mod indexer;
pub mod ingestion;
pub mod retriever;
pub mod session;
pub mod stores;
pub mod types;

pub use config::RagConfig;
pub use context::{Context, ContextAssembler, GROUNDING_FALLBACK};
pub use indexer::{IndexReport, IndexWriter};
pub use retriever::Retriever;
pub use session::{QuerySession, SessionPhase, TurnOutcome};
pub use types::{Chunk, Document, Evidence, RagError};
