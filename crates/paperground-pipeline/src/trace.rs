//! Per-request trace assembly.
//!
//! Mirrors a "thinking steps" progress feed: each stage opens a record
//! when it starts and resolves it on completion, so a caller streaming
//! the trace sees in-progress stages, and a returned trace reads as a
//! complete stage history.

use std::time::Instant;

use paperground_core::types::{StageStatus, TraceRecord, TraceSummary};

#[derive(Debug, Default)]
pub struct TraceBuilder {
    records: Vec<TraceRecord>,
    summary: TraceSummary,
    open: Option<(usize, Instant)>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stage record. A still-open previous stage is resolved as
    /// complete with no detail first.
    pub fn begin(&mut self, stage: &str) {
        if self.open.is_some() {
            self.resolve(StageStatus::Complete, String::new());
        }
        self.open = Some((self.records.len(), Instant::now()));
        self.records.push(TraceRecord {
            stage: stage.to_string(),
            status: StageStatus::InProgress,
            detail: String::new(),
            elapsed_ms: 0,
        });
    }

    pub fn complete(&mut self, detail: impl Into<String>) {
        self.resolve(StageStatus::Complete, detail.into());
    }

    pub fn degrade(&mut self, detail: impl Into<String>) {
        self.resolve(StageStatus::Degraded, detail.into());
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.resolve(StageStatus::Failed, detail.into());
    }

    /// Append a standalone event under an already-resolved stage, e.g. a
    /// truncation notice from the assembler.
    pub fn note(&mut self, stage: &str, status: StageStatus, detail: impl Into<String>) {
        self.records.push(TraceRecord {
            stage: stage.to_string(),
            status,
            detail: detail.into(),
            elapsed_ms: 0,
        });
    }

    fn resolve(&mut self, status: StageStatus, detail: String) {
        if let Some((idx, started)) = self.open.take() {
            let record = &mut self.records[idx];
            record.status = status;
            record.detail = detail;
            record.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        }
    }

    pub fn add_llm_call(&mut self, calls: u32, input_tokens: usize, output_tokens: usize) {
        self.summary.llm_calls += calls;
        self.summary.input_tokens += input_tokens;
        self.summary.output_tokens += output_tokens;
    }

    pub fn add_embed_calls(&mut self, calls: u32) {
        self.summary.embed_calls += calls;
    }

    pub fn summary(&self) -> TraceSummary {
        self.summary
    }

    pub fn into_parts(mut self) -> (Vec<TraceRecord>, TraceSummary) {
        if self.open.is_some() {
            self.resolve(StageStatus::Complete, String::new());
        }
        (self.records, self.summary)
    }
}
