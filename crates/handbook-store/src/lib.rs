//! handbook-store
//!
//! Lexical+vector stores behind the `HybridStore`, `DocumentSink` and
//! `FunctionIndex` seams: an in-process tantivy store and a PostgREST client.
pub mod local;
pub mod supabase;
pub mod tantivy_utils;
pub mod trigram;

pub use local::LocalStore;
pub use supabase::SupabaseStore;
