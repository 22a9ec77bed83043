use std::{path::Path, sync::Arc};

use crate::discovery::{ScrapedSubject, SourceError, SourceSession, SubjectSource};

/// A source backed by a dump of scraped records.
///
/// Searches return every record whose code starts with the prefix, in code
/// order.
#[derive(Debug, Clone)]
pub struct FileSource {
    records: Arc<[ScrapedSubject]>,
}

/// A session over a [`FileSource`].
#[derive(Debug, Clone)]
pub struct FileSession {
    records: Arc<[ScrapedSubject]>,
}

impl FileSource {
    /// Reads a JSON (`.json`) or YAML (any other extension) list of records.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ScrapedSubject> =
            if path.extension().is_some_and(|extension| extension == "json") {
                serde_json::from_str(&content).map_err(|e| SourceError::Format(e.to_string()))?
            } else {
                serde_yaml::from_str(&content).map_err(|e| SourceError::Format(e.to_string()))?
            };
        tracing::debug!(records = records.len(), "Read records from {}", path.display());
        Ok(Self::from_records(records))
    }

    /// A source over records already in memory.
    #[must_use]
    pub fn from_records(mut records: Vec<ScrapedSubject>) -> Self {
        records.sort_by(|a, b| a.code.cmp(&b.code));
        Self {
            records: records.into(),
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SubjectSource for FileSource {
    type Session = FileSession;

    fn connect(&self) -> Result<Self::Session, SourceError> {
        Ok(FileSession {
            records: Arc::clone(&self.records),
        })
    }
}

impl SourceSession for FileSession {
    fn search(&mut self, prefix: &str) -> Result<Vec<ScrapedSubject>, SourceError> {
        let start = self
            .records
            .partition_point(|record| record.code.as_str() < prefix);
        Ok(self.records[start..]
            .iter()
            .take_while(|record| record.code.starts_with(prefix))
            .cloned()
            .collect())
    }
}
