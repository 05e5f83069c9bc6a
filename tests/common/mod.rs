//! Shared fixtures for integration tests.

use docsim::config::Settings;
use docsim::embedding::{EmbeddingError, TextEmbedder};
use std::path::Path;

/// Deterministic embedder for integration tests: hashes whitespace
/// tokens into a fixed number of buckets and counts occurrences.
/// Identical texts embed identically; no model download, no network.
pub struct TokenHashEmbedder {
    dimension: usize,
}

impl TokenHashEmbedder {
    pub fn new() -> Self {
        Self { dimension: 16 }
    }
}

impl TextEmbedder for TokenHashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let mut vector = vec![0.0f32; self.dimension];
            for token in text.split_whitespace() {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                let bucket = (hasher.finish() as usize) % self.dimension;
                vector[bucket] += 1.0;
            }
            embeddings.push(vector);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "token-hash-test"
    }
}

/// Write one partition of .txt documents under `root`, the layout
/// `TextFolderSource` reads.
pub fn write_partition(root: &Path, partition: &str, docs: &[(&str, &str)]) {
    let dir = root.join(partition);
    std::fs::create_dir_all(&dir).unwrap();
    for (id, text) in docs {
        std::fs::write(dir.join(format!("{id}.txt")), text).unwrap();
    }
}

/// Settings pointed at temp-dir source and output locations, with a
/// small thread pool so tests stay cheap.
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.source.text_root = root.join("output_text");
    settings.output.json_dir = root.join("output_json");
    settings.search.parallel_threads = 2;
    settings
}
