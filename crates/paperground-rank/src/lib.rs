#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod mmr;
pub mod rerank;

pub use rerank::{LlmReranker, RerankOutcome};
