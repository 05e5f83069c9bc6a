//! Result sink: persists one run's similarity mapping as a JSON file.
//!
//! The file is pretty-printed UTF-8 with non-ASCII characters preserved
//! literally, written atomically (temp file + rename in the destination
//! directory) so a failed run never leaves a partial result behind.
//! Paths are keyed by session id, so concurrent runs for different
//! sessions never collide.

use crate::similarity::SimilarityMatches;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Errors raised while persisting results
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(
        "Failed to create output directory '{path}': {source}\nSuggestion: check permissions on the parent directory"
    )]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Failed to write result file '{path}': {source}\nSuggestion: check disk space and permissions; the in-memory results are intact"
    )]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize similarity results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes similarity result files into a configured output directory.
///
/// The directory is explicit construction-time configuration; creating
/// it happens here, never as ambient process-wide setup.
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    /// Create a sink, creating the output directory if needed.
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| SinkError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self { output_dir })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The path a given session's results are written to
    #[must_use]
    pub fn result_path(&self, session_id: &str) -> PathBuf {
        self.output_dir.join(format!("{session_id}_results.json"))
    }

    /// Atomically persist one run's similarity mapping.
    ///
    /// Serialization happens up front; the bytes then go to a temp file
    /// in the destination directory, are synced, and renamed into place.
    /// On any failure the destination path is left untouched.
    pub fn write(
        &self,
        session_id: &str,
        matches: &SimilarityMatches,
    ) -> Result<PathBuf, SinkError> {
        let path = self.result_path(session_id);
        let json = serde_json::to_string_pretty(matches)?;

        let write_err = |source: io::Error| SinkError::WriteFailure {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.output_dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path)
            .map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), documents = matches.len(), "result file written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockTextEmbedder;
    use crate::similarity::SimilarityResolver;
    use crate::source::{DocumentSet, DocumentSource, SourceError};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct MapSource(DocumentSet);

    impl DocumentSource for MapSource {
        fn fetch(&self, _partition_key: &str) -> Result<DocumentSet, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn sample_matches(docs: &[(&str, &str)]) -> SimilarityMatches {
        let documents: DocumentSet = docs
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();
        let mut settings = crate::config::Settings::default();
        settings.search.parallel_threads = 2;
        let resolver = SimilarityResolver::new(
            MapSource(documents),
            MockTextEmbedder::new(),
            Arc::new(settings),
        );
        resolver.resolve("test", &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_write_creates_pretty_json_keyed_by_session() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ResultSink::create(temp_dir.path().join("output_json")).unwrap();

        let matches = sample_matches(&[("a", "one two"), ("b", "three four")]);
        let path = sink.write("alice_20260806120000", &matches).unwrap();

        assert_eq!(
            path.file_name().unwrap(),
            "alice_20260806120000_results.json"
        );

        let content = std::fs::read_to_string(&path).unwrap();
        // Pretty-printed: keys on their own indented lines
        assert!(content.contains("\n  \"a\""));

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, serde_json::to_value(&matches).unwrap());
    }

    #[test]
    fn test_non_ascii_ids_are_preserved_literally() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ResultSink::create(temp_dir.path()).unwrap();

        let matches = sample_matches(&[("café_reçu", "montant dû"), ("facture", "total payé")]);
        let path = sink.write("s1", &matches).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("café_reçu"));
        assert!(!content.contains("\\u"));
    }

    #[test]
    fn test_distinct_sessions_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ResultSink::create(temp_dir.path()).unwrap();

        let matches = sample_matches(&[("a", "one"), ("b", "two")]);
        let first = sink.write("alice_1", &matches).unwrap();
        let second = sink.write("alice_2", &matches).unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_rewrite_replaces_atomically() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ResultSink::create(temp_dir.path()).unwrap();

        let matches = sample_matches(&[("a", "one"), ("b", "two")]);
        let path = sink.write("s1", &matches).unwrap();
        sink.write("s1", &matches).unwrap();

        // Still exactly one valid result file, no temp leftovers
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(parsed.is_object());
    }

    #[test]
    fn test_create_fails_cleanly_on_unwritable_parent() {
        // A file standing where the directory should go
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("occupied");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = ResultSink::create(blocker.join("output"));
        assert!(matches!(result, Err(SinkError::CreateDir { .. })));
    }
}
