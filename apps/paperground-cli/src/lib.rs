#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Host for the pipeline's external collaborators: document ingestion,
//! an offline hashing embedder, and language-model clients (an
//! OpenAI-compatible HTTP client plus a deterministic extractive
//! stand-in for fully offline use).

pub mod embedder;
pub mod ingest;
pub mod model;
