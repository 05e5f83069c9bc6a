//! Similarity resolver: orchestrates the embedding-and-search pipeline.
//!
//! One call resolves a whole partition: fetch documents, embed each text,
//! build an ephemeral flat index over the batch, query the index with
//! every vector, and assemble the id → [nearest ids] mapping. The index
//! lives only for the duration of the run; concurrent sessions never
//! share state.

use crate::config::Settings;
use crate::embedding::TextEmbedder;
use crate::error::{PipelineError, PipelineResult};
use crate::index::FlatIndex;
use crate::sink::ResultSink;
use crate::source::{DocumentSet, DocumentSource};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The materialized result of one similarity run: every document id
/// mapped to its neighbor ids, nearest first.
///
/// Serializes transparently to the result-file shape
/// `{"doc-id": ["neighbor-id", ...], ...}` with keys in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SimilarityMatches(BTreeMap<String, Vec<String>>);

impl SimilarityMatches {
    /// Neighbor ids for one document, nearest first
    #[must_use]
    pub fn neighbors_of(&self, id: &str) -> Option<&[String]> {
        self.0.get(id).map(Vec::as_slice)
    }

    /// Number of documents in the result
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Orchestrates Document Source → Embedder → Vector Index into ranked
/// neighbor lists for every document of a partition.
pub struct SimilarityResolver<S, E> {
    source: S,
    embedder: E,
    settings: Arc<Settings>,
}

impl<S: DocumentSource, E: TextEmbedder> SimilarityResolver<S, E> {
    pub fn new(source: S, embedder: E, settings: Arc<Settings>) -> Self {
        Self {
            source,
            embedder,
            settings,
        }
    }

    /// Resolve a partition into its in-memory similarity mapping.
    ///
    /// The cancellation token is honored between embedding batches
    /// (checkpointed cancellation); the index build and query batch only
    /// start once encoding is complete. A cancelled run returns
    /// [`PipelineError::Cancelled`] and writes nothing.
    pub fn resolve(
        &self,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<SimilarityMatches> {
        let documents = self.source.fetch(partition_key).map_err(|source| {
            PipelineError::SourceUnavailable {
                partition: partition_key.to_string(),
                source,
            }
        })?;

        if documents.is_empty() {
            return Err(PipelineError::EmptyPartition {
                partition: partition_key.to_string(),
            });
        }

        info!(
            partition = partition_key,
            documents = documents.len(),
            model = self.embedder.model_name(),
            "embedding partition"
        );
        let vectors = self.embed_documents(&documents, cancel)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let index = FlatIndex::build(&vectors)?;
        debug!(
            vectors = index.len(),
            dimension = index.dimension().get(),
            "flat index built"
        );
        crate::debug_print!(
            "partition '{partition_key}': {} vectors of dimension {}",
            index.len(),
            index.dimension().get()
        );

        self.query_all(&index, &vectors)
    }

    /// Resolve a partition and persist the result file.
    ///
    /// Returns the written path. On a sink failure the in-memory result
    /// is lost with this entry point; callers that want to retry the
    /// write alone should use [`Self::resolve`] + [`ResultSink::write`].
    pub fn run(
        &self,
        partition_key: &str,
        session_id: &str,
        sink: &ResultSink,
        cancel: &CancellationToken,
    ) -> PipelineResult<PathBuf> {
        let matches = self.resolve(partition_key, cancel)?;
        let path = sink.write(session_id, &matches)?;
        info!(
            partition = partition_key,
            session = session_id,
            path = %path.display(),
            "similarity results persisted"
        );
        Ok(path)
    }

    /// Embed every document, in batches, checking for cancellation
    /// between batches. Each text embeds independently, so batch
    /// boundaries never affect the vectors.
    fn embed_documents(
        &self,
        documents: &DocumentSet,
        cancel: &CancellationToken,
    ) -> PipelineResult<BTreeMap<String, Vec<f32>>> {
        let batch_size = self.settings.embedding.batch_size.max(1);
        let entries: Vec<(&String, &String)> = documents.iter().collect();

        let mut vectors = BTreeMap::new();
        for chunk in entries.chunks(batch_size) {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let texts: Vec<&str> = chunk.iter().map(|(_, text)| text.as_str()).collect();
            let embedded = self.embedder.embed_batch(&texts)?;
            debug!(batch = chunk.len(), "embedded batch");

            for ((id, _), vector) in chunk.iter().zip(embedded) {
                vectors.insert((*id).clone(), vector);
            }
        }
        Ok(vectors)
    }

    /// Query the index with every indexed vector in parallel and
    /// assemble the neighbor lists. O(N²·D) total, the documented cost
    /// of exact self-similarity over the whole partition.
    fn query_all(
        &self,
        index: &FlatIndex,
        vectors: &BTreeMap<String, Vec<f32>>,
    ) -> PipelineResult<SimilarityMatches> {
        let neighbors = self.settings.search.neighbors;
        let exclude_self = self.settings.search.exclude_self;
        // Under self-exclusion fetch one extra candidate so dropping the
        // document itself still leaves k results when the corpus allows.
        let query_k = if exclude_self {
            neighbors.saturating_add(1)
        } else {
            neighbors
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.search.parallel_threads)
            .build()
            .map_err(|e| PipelineError::Config {
                reason: format!("failed to build search thread pool: {e}"),
            })?;

        let entries: Vec<(&String, &Vec<f32>)> = vectors.iter().collect();
        let lists = pool.install(|| {
            entries
                .par_iter()
                .map(|(id, vector)| {
                    let ranked = index.search(vector.as_slice(), Some(id.as_str()), query_k)?;
                    let ids: Vec<String> = ranked
                        .into_iter()
                        .filter(|n| !(exclude_self && n.id == **id))
                        .take(neighbors)
                        .map(|n| n.id)
                        .collect();
                    Ok(((*id).clone(), ids))
                })
                .collect::<Result<Vec<_>, crate::index::IndexError>>()
        })?;

        Ok(SimilarityMatches(lists.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockTextEmbedder;
    use crate::source::SourceError;

    /// In-memory source serving a fixed document set for any partition
    struct MapSource(DocumentSet);

    impl DocumentSource for MapSource {
        fn fetch(&self, _partition_key: &str) -> Result<DocumentSet, SourceError> {
            Ok(self.0.clone())
        }
    }

    /// Source that always fails, standing in for an unreachable store
    struct DownSource;

    impl DocumentSource for DownSource {
        fn fetch(&self, _partition_key: &str) -> Result<DocumentSet, SourceError> {
            Err(SourceError::Unavailable {
                path: "unreachable".into(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
        }
    }

    fn corpus() -> DocumentSet {
        [
            ("a", "cat sat on mat"),
            ("b", "cat sat on mat"),
            ("c", "stock market rose today"),
        ]
        .into_iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect()
    }

    fn resolver_with(
        documents: DocumentSet,
        mutate: impl FnOnce(&mut Settings),
    ) -> SimilarityResolver<MapSource, MockTextEmbedder> {
        let mut settings = Settings::default();
        settings.search.parallel_threads = 2;
        mutate(&mut settings);
        SimilarityResolver::new(
            MapSource(documents),
            MockTextEmbedder::new(),
            Arc::new(settings),
        )
    }

    #[test]
    fn test_resolve_include_self_contract() {
        let resolver = resolver_with(corpus(), |_| {});
        let matches = resolver
            .resolve("alice", &CancellationToken::new())
            .unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches.neighbors_of("a").unwrap(), ["a", "b", "c"]);
        assert_eq!(matches.neighbors_of("b").unwrap(), ["b", "a", "c"]);
        assert_eq!(matches.neighbors_of("c").unwrap(), ["c", "a", "b"]);
    }

    #[test]
    fn test_resolve_exclude_self_contract() {
        let resolver = resolver_with(corpus(), |s| s.search.exclude_self = true);
        let matches = resolver
            .resolve("alice", &CancellationToken::new())
            .unwrap();

        assert_eq!(matches.neighbors_of("a").unwrap(), ["b", "c"]);
        assert_eq!(matches.neighbors_of("b").unwrap(), ["a", "c"]);
        assert_eq!(matches.neighbors_of("c").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_k_truncates_to_corpus_size() {
        let resolver = resolver_with(corpus(), |s| s.search.neighbors = 10);
        let matches = resolver
            .resolve("alice", &CancellationToken::new())
            .unwrap();

        for (_, neighbors) in matches.iter() {
            assert_eq!(neighbors.len(), 3);
        }
    }

    #[test]
    fn test_empty_partition_is_an_error() {
        let resolver = resolver_with(DocumentSet::new(), |_| {});
        let result = resolver.resolve("alice", &CancellationToken::new());
        assert!(matches!(
            result,
            Err(PipelineError::EmptyPartition { .. })
        ));
    }

    #[test]
    fn test_unreachable_source_propagates() {
        let settings = Arc::new(Settings::default());
        let resolver = SimilarityResolver::new(DownSource, MockTextEmbedder::new(), settings);

        let result = resolver.resolve("alice", &CancellationToken::new());
        match result {
            Err(PipelineError::SourceUnavailable { partition, .. }) => {
                assert_eq!(partition, "alice");
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_token_aborts_before_embedding() {
        let resolver = resolver_with(corpus(), |_| {});
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolver.resolve("alice", &cancel);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = resolver_with(corpus(), |_| {});
        let cancel = CancellationToken::new();

        let first = resolver.resolve("alice", &cancel).unwrap();
        let second = resolver.resolve("alice", &cancel).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_small_batches_do_not_change_vectors() {
        let first = resolver_with(corpus(), |s| s.embedding.batch_size = 1)
            .resolve("alice", &CancellationToken::new())
            .unwrap();
        let second = resolver_with(corpus(), |s| s.embedding.batch_size = 64)
            .resolve("alice", &CancellationToken::new())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_serialize_to_plain_object() {
        let resolver = resolver_with(corpus(), |_| {});
        let matches = resolver
            .resolve("alice", &CancellationToken::new())
            .unwrap();

        let json = serde_json::to_value(&matches).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "a": ["a", "b", "c"],
                "b": ["b", "a", "c"],
                "c": ["c", "a", "b"],
            })
        );
    }
}
