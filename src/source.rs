//! Document source boundary.
//!
//! The similarity pipeline treats the document store as an external
//! collaborator: a key-text mapping retrievable by partition. The
//! [`DocumentSource`] trait is the seam; [`TextFolderSource`] is the
//! built-in implementation reading OCR output from disk.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Documents of one partition, keyed by document id.
///
/// Ordered map so iteration (and therefore downstream embedding order and
/// result-file key order) is deterministic.
pub type DocumentSet = BTreeMap<String, String>;

/// Errors raised by a document source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Document store unreachable at '{path}': {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read document '{path}': {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read-only access to the documents of a partition.
///
/// Implementations must surface store failures as
/// [`SourceError::Unavailable`] promptly rather than blocking
/// indefinitely; timeouts are the caller's responsibility.
pub trait DocumentSource {
    /// Fetch all documents for a partition, keyed by document id.
    ///
    /// An existing but empty partition yields an empty set; the resolver
    /// turns that into its "nothing to do" error.
    fn fetch(&self, partition_key: &str) -> Result<DocumentSet, SourceError>;
}

/// Document source backed by a directory of extracted text files.
///
/// Layout: `<root>/<partition>/<document-id>.txt`, one file per document,
/// the file stem serving as the document id. This mirrors the OCR stage's
/// output folder, which writes one text file per processed upload.
pub struct TextFolderSource {
    root: PathBuf,
}

impl TextFolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for TextFolderSource {
    fn fetch(&self, partition_key: &str) -> Result<DocumentSet, SourceError> {
        let partition_dir = self.root.join(partition_key);

        let entries = std::fs::read_dir(&partition_dir).map_err(|source| {
            SourceError::Unavailable {
                path: partition_dir.clone(),
                source,
            }
        })?;

        let mut documents = DocumentSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Unavailable {
                path: partition_dir.clone(),
                source,
            })?;
            let path = entry.path();

            if path.extension().is_none_or(|ext| ext != "txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let text = std::fs::read_to_string(&path).map_err(|source| {
                SourceError::DocumentRead {
                    path: path.clone(),
                    source,
                }
            })?;
            documents.insert(stem.to_string(), text);
        }

        debug!(
            partition = partition_key,
            documents = documents.len(),
            "fetched partition from text folder"
        );
        Ok(documents)
    }
}
