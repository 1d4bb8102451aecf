//! Clause retrieval: flat embedding index, retriever and per-policy cache

mod cache;
mod index;
mod retriever;

pub use cache::{IndexCache, IndexSummary};
pub use index::{PolicyIndex, SearchHit};
pub use retriever::Retriever;
