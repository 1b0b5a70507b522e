//! Directory ingestion: .txt files to embedded passages.
//!
//! Paragraph-based chunking with word overlap for long paragraphs. Page
//! numbers come from form feeds when the source has them (pdftotext
//! output does); otherwise they are approximated from the running word
//! count.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use paperground_core::traits::Embedder;
use paperground_core::types::{approx_tokens, term_tokens, Passage};

/// Words per synthetic page when the source carries no form feeds.
const WORDS_PER_PAGE: usize = 800;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_percent: 0.2,
        }
    }
}

#[derive(Default)]
pub struct DocumentLoader {
    chunking: ChunkingConfig,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest every .txt file under `data_dir` into passages, embedding
    /// each one with `embedder`.
    pub async fn load_directory(
        &self,
        data_dir: &Path,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Passage>> {
        let files = list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(Vec::new());
        }

        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(ProgressStyle::with_template(
            "{bar:30} {pos}/{len} {msg}",
        )?);

        let mut all = Vec::new();
        for file_path in &files {
            bar.set_message(file_path.display().to_string());
            let content = read_file_content(file_path)?;
            let doc_id = doc_id_of(file_path);
            let mut passages = self.chunk_document(&content, &doc_id);
            for passage in &mut passages {
                passage.embedding = embedder
                    .embed(&passage.text)
                    .await
                    .map_err(|e| anyhow::anyhow!("embedding {}: {e}", passage.id))?;
            }
            all.extend(passages);
            bar.inc(1);
        }
        bar.finish_and_clear();
        info!(files = files.len(), passages = all.len(), "ingestion complete");
        Ok(all)
    }

    fn chunk_document(&self, content: &str, doc_id: &str) -> Vec<Passage> {
        let mut passages = Vec::new();
        let mut chunk_index = 0usize;
        let has_form_feeds = content.contains('\u{c}');
        let mut words_seen = 0usize;

        for (page_idx, page_text) in content.split('\u{c}').enumerate() {
            for paragraph in page_text.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                let page = if has_form_feeds {
                    u32::try_from(page_idx + 1).unwrap_or(u32::MAX)
                } else {
                    u32::try_from(words_seen / WORDS_PER_PAGE + 1).unwrap_or(u32::MAX)
                };
                words_seen += paragraph.split_whitespace().count();

                if approx_tokens(paragraph) <= self.chunking.max_tokens {
                    passages.push(self.build_passage(doc_id, chunk_index, page, paragraph));
                    chunk_index += 1;
                } else {
                    for piece in self.split_with_overlap(paragraph) {
                        passages.push(self.build_passage(doc_id, chunk_index, page, &piece));
                        chunk_index += 1;
                    }
                }
            }
        }
        passages
    }

    fn build_passage(&self, doc_id: &str, chunk_index: usize, page: u32, text: &str) -> Passage {
        let mut term_counts = std::collections::HashMap::new();
        for term in term_tokens(text) {
            *term_counts.entry(term).or_default() += 1;
        }
        Passage {
            id: format!("{doc_id}:{chunk_index}"),
            doc_id: doc_id.to_string(),
            doc_title: doc_id.to_string(),
            page,
            text: text.to_string(),
            token_count: approx_tokens(text),
            embedding: Vec::new(),
            term_counts,
        }
    }

    fn split_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = 300;
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let overlap_words = (words_per_chunk as f32 * self.chunking.overlap_percent) as usize;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        chunks
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn doc_id_of(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string())
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn small_file_becomes_one_embedded_passage() {
        let tmp = TempDir::new().unwrap();
        let mut f = fs::File::create(tmp.path().join("attn.txt")).unwrap();
        writeln!(f, "Transformers use self attention.").unwrap();

        let loader = DocumentLoader::new();
        let passages = loader
            .load_directory(tmp.path(), &HashEmbedder::new(64))
            .await
            .unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].doc_title, "attn");
        assert_eq!(passages[0].page, 1);
        assert_eq!(passages[0].embedding.len(), 64);
        assert!(passages[0].term_counts.contains_key("attention"));
    }

    #[tokio::test]
    async fn form_feeds_become_page_numbers() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("paper.txt"),
            "page one text\u{c}page two text",
        )
        .unwrap();

        let passages = DocumentLoader::new()
            .load_directory(tmp.path(), &HashEmbedder::new(32))
            .await
            .unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].page, 1);
        assert_eq!(passages[1].page, 2);
    }

    #[tokio::test]
    async fn long_paragraph_is_split_with_overlap() {
        let tmp = TempDir::new().unwrap();
        let long = vec!["word"; 900].join(" ");
        fs::write(tmp.path().join("long.txt"), long).unwrap();

        let passages = DocumentLoader::new()
            .load_directory(tmp.path(), &HashEmbedder::new(32))
            .await
            .unwrap();
        assert!(passages.len() > 1, "900 words exceed one 500-token chunk");
        let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids[0], "long:0");
        assert_eq!(ids[1], "long:1");
    }
}
