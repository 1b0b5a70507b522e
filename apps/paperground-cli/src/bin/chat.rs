//! Interactive grounded-QA chat over a directory of text documents.
//!
//! Usage: `paperground-chat <data-dir>`. Set
//! `PAPERGROUND_MODEL_ENDPOINT` (plus `_API_KEY` / `_NAME`) to use an
//! OpenAI-compatible model server; without it the offline extractive
//! model is used.

use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use paperground_cli::embedder::HashEmbedder;
use paperground_cli::ingest::DocumentLoader;
use paperground_cli::model::{ExtractiveModel, OpenAiCompatClient};
use paperground_core::config::{expand_path, PipelineConfig};
use paperground_core::traits::LanguageModel;
use paperground_core::types::{DocumentCorpus, StageStatus, TraceSummary};
use paperground_pipeline::{cancel_flag, Pipeline};
use paperground_retrieval::sparse::Bm25Scorer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data_dir = env::args()
        .nth(1)
        .map(expand_path)
        .unwrap_or_else(|| expand_path("./papers"));
    let config = PipelineConfig::load()?;

    let embedder = Arc::new(HashEmbedder::default());
    let model = build_model();

    println!("📚 Loading documents from {}", data_dir.display());
    let loader = DocumentLoader::new();
    let passages = loader.load_directory(&data_dir, embedder.as_ref()).await?;
    let mut corpus = DocumentCorpus::new();
    corpus.add_passages(passages);
    println!(
        "   {} passages across {} documents\n",
        corpus.len(),
        corpus.document_count()
    );

    let pipeline = Pipeline::new(embedder, Arc::new(Bm25Scorer::default()), model, &config);

    let mut totals = TraceSummary::default();
    let stdin = std::io::stdin();
    loop {
        print!("📖 Ask about your documents (or 'quit'): ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match pipeline.answer(&corpus, query, &cancel_flag()).await {
            Ok(answer) => {
                println!("\n{}\n", answer.answer_text);
                if !answer.citations.is_empty() {
                    println!("Sources:");
                    for citation in &answer.citations {
                        println!("  - {}, p.{}", citation.doc_title, citation.page);
                    }
                }
                for record in &answer.trace {
                    let marker = match record.status {
                        StageStatus::Complete => "✓",
                        StageStatus::Degraded => "~",
                        StageStatus::Failed => "✗",
                        StageStatus::InProgress => "…",
                    };
                    println!("  {marker} {} ({} ms) {}", record.stage, record.elapsed_ms, record.detail);
                }
                println!();
                accumulate(&mut totals, answer.summary);
            }
            Err(failure) => {
                println!("\n❌ {failure}\n");
                accumulate(&mut totals, failure.summary);
            }
        }
    }

    println!("\nSession summary");
    println!("  🤖 LLM calls: {}", totals.llm_calls);
    println!("  🔌 Embedding calls: {}", totals.embed_calls);
    println!(
        "  📝 Tokens: {} in / {} out",
        totals.input_tokens, totals.output_tokens
    );
    Ok(())
}

fn build_model() -> Arc<dyn LanguageModel> {
    match env::var("PAPERGROUND_MODEL_ENDPOINT") {
        Ok(endpoint) => {
            let api_key = env::var("PAPERGROUND_MODEL_API_KEY").unwrap_or_default();
            let model = env::var("PAPERGROUND_MODEL_NAME")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string());
            println!("🌐 Using model endpoint {endpoint} ({model})");
            Arc::new(OpenAiCompatClient::new(endpoint, api_key, model))
        }
        Err(_) => {
            println!("🧩 No model endpoint configured, using offline extractive model");
            Arc::new(ExtractiveModel)
        }
    }
}

fn accumulate(totals: &mut TraceSummary, summary: TraceSummary) {
    totals.llm_calls += summary.llm_calls;
    totals.embed_calls += summary.embed_calls;
    totals.input_tokens += summary.input_tokens;
    totals.output_tokens += summary.output_tokens;
}
