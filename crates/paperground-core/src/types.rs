//! Domain types shared by the retrieval, ranking and synthesis stages.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type PassageId = String;

/// An immutable unit of retrievable text, produced by the external
/// ingestion layer.
///
/// - `id`: globally unique passage identifier
/// - `doc_id`: stable identity of the owning document
/// - `doc_title`: human-readable title used in citations
/// - `page`: 1-based page number within the document
/// - `token_count`: precomputed size in model tokens
/// - `embedding`: precomputed dense vector
/// - `term_counts`: precomputed term frequencies for sparse scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub doc_id: String,
    pub doc_title: String,
    pub page: u32,
    pub text: String,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    pub term_counts: HashMap<String, u32>,
}

impl Passage {
    /// Total number of term occurrences, used for sparse length
    /// normalization.
    pub fn term_len(&self) -> u32 {
        self.term_counts.values().sum()
    }
}

/// Rough model-token estimate (the ~0.75 words-per-token heuristic).
/// Used for ingestion-time `token_count` and call telemetry.
pub fn approx_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    {
        (words as f32 / 0.75) as usize
    }
}

/// Lowercase alphanumeric terms of a text, as counted in
/// `Passage::term_counts`. Ingestion and query-time scoring must agree
/// on this tokenization.
pub fn term_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// All passages loaded into one session, plus the corpus-level term
/// statistics sparse scoring needs.
///
/// Extended in place when the external loader adds a document; read-only
/// for the duration of a request.
#[derive(Debug, Clone, Default)]
pub struct DocumentCorpus {
    passages: Vec<Arc<Passage>>,
    by_id: HashMap<PassageId, usize>,
    doc_freqs: HashMap<String, u32>,
    total_term_len: u64,
}

impl DocumentCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ingested passages. A passage whose id is already present is
    /// ignored, so re-loading a document is idempotent.
    pub fn add_passages(&mut self, passages: Vec<Passage>) {
        for passage in passages {
            if self.by_id.contains_key(&passage.id) {
                continue;
            }
            self.total_term_len += u64::from(passage.term_len());
            for term in passage.term_counts.keys() {
                *self.doc_freqs.entry(term.clone()).or_default() += 1;
            }
            self.by_id.insert(passage.id.clone(), self.passages.len());
            self.passages.push(Arc::new(passage));
        }
    }

    pub fn passages(&self) -> &[Arc<Passage>] {
        &self.passages
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Passage>> {
        self.by_id.get(id).map(|&i| &self.passages[i])
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.passages
            .iter()
            .map(|p| p.doc_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of passages containing `term`.
    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    /// Mean term length of a passage, for BM25 length normalization.
    pub fn avg_term_len(&self) -> f32 {
        if self.passages.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_term_len as f32 / self.passages.len() as f32
        }
    }
}

/// The task a query is asking the pipeline to perform. Closed set so
/// profile dispatch is an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Qa,
    Summarize,
    Compare,
    Explain,
}

impl TaskKind {
    /// Answer-style directive embedded in the synthesis prompt.
    pub fn style_instruction(self) -> &'static str {
        match self {
            Self::Qa => "Answer the question directly and concisely.",
            Self::Summarize => "Summarize the relevant material section by section.",
            Self::Compare => {
                "Compare and contrast what each document says, making disagreements explicit."
            }
            Self::Explain => "Explain the concept step by step, building up from fundamentals.",
        }
    }
}

/// Per-task retrieval and selection parameters, fixed per `TaskKind`.
#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub kind: TaskKind,
    /// Top-K passages fetched per query variant.
    pub retrieval_depth: usize,
    /// Candidates passed to the reranker.
    pub rerank_depth: usize,
    /// Final selection size.
    pub select_size: usize,
    /// MMR relevance weight. Lower values trade relevance for spread
    /// across documents.
    pub lambda: f32,
}

impl TaskProfile {
    pub fn for_kind(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Qa => Self {
                kind,
                retrieval_depth: 12,
                rerank_depth: 8,
                select_size: 5,
                lambda: 0.8,
            },
            TaskKind::Summarize => Self {
                kind,
                retrieval_depth: 16,
                rerank_depth: 10,
                select_size: 6,
                lambda: 0.6,
            },
            TaskKind::Compare => Self {
                kind,
                retrieval_depth: 16,
                rerank_depth: 10,
                select_size: 6,
                lambda: 0.5,
            },
            TaskKind::Explain => Self {
                kind,
                retrieval_depth: 12,
                rerank_depth: 8,
                select_size: 5,
                lambda: 0.7,
            },
        }
    }
}

/// A passage annotated with request-scoped scores. `fused_score` is the
/// hybrid retrieval score; `rerank_score` is set once the reranker has
/// judged the passage.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
}

impl ScoredPassage {
    /// Best available relevance estimate for downstream selection.
    pub fn relevance(&self) -> f32 {
        self.rerank_score.unwrap_or(self.fused_score)
    }
}

/// The evidence block handed to the answer model: passages in citation
/// order plus their serialized text, within the token budget.
#[derive(Debug, Clone)]
pub struct SelectedContext {
    pub passages: Vec<ScoredPassage>,
    pub serialized: String,
    pub used_tokens: usize,
    pub truncated: bool,
}

impl SelectedContext {
    /// Whether a (title, page) pair refers to a passage in this context.
    pub fn contains(&self, doc_title: &str, page: u32) -> bool {
        self.passages
            .iter()
            .any(|sp| sp.passage.doc_title.eq_ignore_ascii_case(doc_title) && sp.passage.page == page)
    }
}

/// A (document title, page) reference parsed from the generated answer
/// and verified against the selected context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub doc_title: String,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    InProgress,
    Complete,
    Degraded,
    Failed,
}

/// One entry of the per-request trace shown to the caller as live
/// progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub stage: String,
    pub status: StageStatus,
    pub detail: String,
    pub elapsed_ms: u64,
}

/// Request-level telemetry totals accumulated across external calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub llm_calls: u32,
    pub embed_calls: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// The pipeline's final product: answer text, the verified citations,
/// and the stage trace.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub trace: Vec<TraceRecord>,
    pub summary: TraceSummary,
}
