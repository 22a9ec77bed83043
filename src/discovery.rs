//! Discovery passes over a subject source.
//!
//! A [`Discovery`] walks the [`CodeSpace`], searches each prefix in a
//! [`SubjectSource`] and ingests every record it finds into a
//! [`SubjectStore`]. Failures are collected per prefix or per code and
//! retried once with a fresh session after the walk. A failure never aborts
//! the pass.

use std::{
    collections::{BTreeMap, HashSet},
    io, mem,
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::domain::{
    Config, InvalidCodeError, Normalizer, ParseError, ResolutionError, Resolver, SubjectCode,
    SubjectStore,
};

mod code_space;
mod file_source;
mod scraped;

pub use code_space::{CodeSpace, MAX_DEPTH};
pub use file_source::{FileSession, FileSource};
pub use scraped::{ParsedSubject, ScrapedSubject};

/// A provider of scraped subject records.
pub trait SubjectSource {
    /// An open connection to the source.
    type Session: SourceSession;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be reached.
    fn connect(&self) -> Result<Self::Session, SourceError>;
}

/// An open connection to a [`SubjectSource`].
pub trait SourceSession {
    /// Returns the records whose code starts with `prefix`.
    ///
    /// A source may truncate long result lists.
    ///
    /// # Errors
    ///
    /// Fails if the search cannot be performed.
    fn search(&mut self, prefix: &str) -> Result<Vec<ScrapedSubject>, SourceError>;
}

/// Errors reported by a [`SubjectSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The source returned data in an unexpected format.
    #[error("malformed source data: {0}")]
    Format(String),

    /// The source refused or failed a request.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// A failure to discover one prefix or one subject.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Searching a prefix failed.
    #[error("cannot search {prefix}")]
    Search {
        /// The prefix searched.
        prefix: String,
        /// What the source reported.
        source: SourceError,
    },

    /// A record carried an invalid code.
    #[error("'{code}' is not a subject code")]
    InvalidCode {
        /// The code as scraped.
        code: String,
        /// Why it was rejected.
        source: InvalidCodeError,
    },

    /// A requirement expression of a record is malformed.
    #[error("cannot parse {field} of {code}")]
    Parse {
        /// The subject.
        code: SubjectCode,
        /// Which expression.
        field: &'static str,
        /// What was wrong with it.
        source: ParseError,
    },

    /// Storing a record failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// A prefix or code that could not be discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// The prefix or code.
    pub key: String,
    /// The last error, with its causes.
    pub reason: String,
}

/// Totals of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Searches performed, retries included.
    pub searches: usize,
    /// Records returned by the source.
    pub found: usize,
    /// Subjects stored.
    pub ingested: usize,
    /// Placeholders created for referenced subjects.
    pub placeholders: usize,
    /// Prefixes or codes retried after the walk.
    pub retried: usize,
    /// Prefixes or codes that still failed after the retry.
    pub failures: Vec<Failure>,
}

/// The context of one discovery pass.
///
/// Holds the caches and the error set of the pass. Build one per pass.
#[derive(Debug)]
pub struct Discovery {
    normalizer: Normalizer,
    deepen_threshold: usize,
    retry_failures: bool,
    /// Codes stored during this pass.
    seen: HashSet<SubjectCode>,
    /// Failed prefixes or codes, with the last error of each.
    errors: BTreeMap<String, DiscoveryError>,
    report: DiscoveryReport,
}

impl Discovery {
    /// A pass configured from `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            normalizer: Normalizer::new(config.max_groups()).with_max_depth(config.max_depth()),
            deepen_threshold: config.deepen_threshold(),
            retry_failures: config.retry_failures,
            seen: HashSet::new(),
            errors: BTreeMap::new(),
            report: DiscoveryReport::default(),
        }
    }

    /// Walks the whole code space, then retries failures once with a new
    /// session.
    ///
    /// A prefix whose search returns at least the deepen threshold of
    /// records is searched again one level deeper, since the source may
    /// have truncated it.
    ///
    /// # Errors
    ///
    /// Fails only if the first session cannot be opened. Every other
    /// failure is recorded in the report.
    #[instrument(skip_all)]
    pub fn run<Src, St>(mut self, source: &Src, store: &mut St) -> Result<DiscoveryReport, SourceError>
    where
        Src: SubjectSource,
        St: SubjectStore,
    {
        let mut session = source.connect()?;
        let mut space = CodeSpace::new();

        while let Some(prefix) = space.next() {
            let found = self.search(&mut session, &prefix, store);
            if found >= self.deepen_threshold && space.deepen() {
                tracing::debug!(%prefix, found, "searching deeper");
            }
        }
        drop(session);

        if self.retry_failures {
            self.retry(source, store);
        }

        Ok(self.finish())
    }

    /// Retries every failed prefix or code once, with a new session.
    fn retry<Src, St>(&mut self, source: &Src, store: &mut St)
    where
        Src: SubjectSource,
        St: SubjectStore,
    {
        if self.errors.is_empty() {
            return;
        }

        let pending = mem::take(&mut self.errors);
        tracing::info!(count = pending.len(), "retrying failures with a new session");

        let mut session = match source.connect() {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "cannot open a session to retry failures");
                self.errors = pending;
                return;
            }
        };

        self.report.retried = pending.len();
        for key in pending.into_keys() {
            self.search(&mut session, &key, store);
        }
    }

    /// Searches one prefix and ingests the results, returning how many
    /// records the source returned.
    fn search<Sess, St>(&mut self, session: &mut Sess, prefix: &str, store: &mut St) -> usize
    where
        Sess: SourceSession,
        St: SubjectStore,
    {
        tracing::info!(%prefix, "searching");
        self.report.searches += 1;

        match session.search(prefix) {
            Ok(records) => {
                let found = records.len();
                self.report.found += found;
                self.ingest_all(&records, store);
                found
            }
            Err(source) => {
                self.fail(
                    prefix.to_string(),
                    DiscoveryError::Search {
                        prefix: prefix.to_string(),
                        source,
                    },
                );
                0
            }
        }
    }

    /// Parses records in parallel, then stores them one by one.
    ///
    /// Records already stored during this pass are skipped.
    pub fn ingest_all<St>(&mut self, records: &[ScrapedSubject], store: &mut St)
    where
        St: SubjectStore,
    {
        let (normalizer, seen) = (&self.normalizer, &self.seen);
        let parsed: Vec<_> = records
            .par_iter()
            .filter(|record| {
                SubjectCode::new(record.code.trim())
                    .ok()
                    .is_none_or(|code| !seen.contains(&code))
            })
            .map(|record| (record, record.parse(normalizer)))
            .collect();

        for (record, result) in parsed {
            match result {
                Ok(subject) => self.ingest(subject, store),
                Err(e) => self.fail(record.code.clone(), e),
            }
        }
    }

    fn ingest<St: SubjectStore>(&mut self, subject: ParsedSubject, store: &mut St) {
        if self.seen.contains(&subject.code) {
            return;
        }

        let ParsedSubject {
            code,
            data,
            prerequisites,
            equivalencies,
        } = subject;
        let name = data.name.clone();

        match Resolver::new(store).ingest(&code, data, &prerequisites, &equivalencies) {
            Ok(outcome) => {
                tracing::info!(%code, %name, "found subject");
                self.report.ingested += 1;
                self.report.placeholders += outcome.placeholders;
                self.errors.remove(code.as_str());
                self.seen.insert(code);
            }
            Err(e) => self.fail(code.to_string(), e.into()),
        }
    }

    fn fail(&mut self, key: String, error: DiscoveryError) {
        tracing::error!(%key, error = %Chain(&error), "cannot process");
        self.errors.insert(key, error);
    }

    fn finish(self) -> DiscoveryReport {
        let mut report = self.report;
        report.failures = self
            .errors
            .into_iter()
            .map(|(key, error)| {
                let reason = Chain(&error).to_string();
                tracing::error!(%key, %reason, "giving up");
                Failure { key, reason }
            })
            .collect();
        report
    }
}

/// Displays an error followed by its causes.
struct Chain<'e>(&'e (dyn std::error::Error + 'static));

impl std::fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::domain::{
        Catalog, GroupRow, RelationKind, StoreError, SubjectData, SubjectId, SubjectStatus,
    };

    fn record(code: &str, prerequisites: &str) -> ScrapedSubject {
        serde_json::from_value(serde_json::json!({
            "code": code,
            "name": format!("Curso {code}"),
            "prerequisites_raw": prerequisites,
        }))
        .unwrap()
    }

    fn code(code: &str) -> SubjectCode {
        SubjectCode::new(code).unwrap()
    }

    /// Truncates every result list to `limit` records, like the catalog
    /// site does.
    struct Truncating {
        inner: FileSource,
        limit: usize,
    }

    struct TruncatingSession {
        inner: FileSession,
        limit: usize,
    }

    impl SubjectSource for Truncating {
        type Session = TruncatingSession;

        fn connect(&self) -> Result<Self::Session, SourceError> {
            Ok(TruncatingSession {
                inner: self.inner.connect()?,
                limit: self.limit,
            })
        }
    }

    impl SourceSession for TruncatingSession {
        fn search(&mut self, prefix: &str) -> Result<Vec<ScrapedSubject>, SourceError> {
            let mut records = self.inner.search(prefix)?;
            records.truncate(self.limit);
            Ok(records)
        }
    }

    /// Fails searches for one prefix in the first `bad_sessions` sessions.
    struct Flaky {
        inner: FileSource,
        prefix: &'static str,
        bad_sessions: usize,
        sessions: Rc<Cell<usize>>,
    }

    struct FlakySession {
        inner: FileSession,
        prefix: &'static str,
        broken: bool,
    }

    impl SubjectSource for Flaky {
        type Session = FlakySession;

        fn connect(&self) -> Result<Self::Session, SourceError> {
            let n = self.sessions.get();
            self.sessions.set(n + 1);
            Ok(FlakySession {
                inner: self.inner.connect()?,
                prefix: self.prefix,
                broken: n < self.bad_sessions,
            })
        }
    }

    impl SourceSession for FlakySession {
        fn search(&mut self, prefix: &str) -> Result<Vec<ScrapedSubject>, SourceError> {
            if self.broken && prefix == self.prefix {
                return Err(SourceError::Unavailable("connection reset".to_string()));
            }
            self.inner.search(prefix)
        }
    }

    fn config(deepen_threshold: usize) -> Config {
        let mut config = Config::default();
        config.set_deepen_threshold(deepen_threshold);
        config
    }

    #[test]
    fn ingests_every_record_and_links_placeholders() {
        let source = FileSource::from_records(vec![
            record("IIC2233", "IIC1103 o IIC1102(c)"),
            record("IIC1103", "No tiene"),
            record("MAT1610", "No tiene"),
        ]);
        let mut catalog = Catalog::default();

        let report = Discovery::new(&Config::default())
            .run(&source, &mut catalog)
            .unwrap();

        assert_eq!(report.ingested, 3);
        assert!(report.failures.is_empty());
        assert_eq!(report.searches, 26);
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.find(&code("IIC1103")).unwrap().status(),
            SubjectStatus::Resolved
        );
        assert_eq!(catalog.placeholders().collect::<Vec<_>>(), vec![&code("IIC1102")]);
        assert_eq!(catalog.row_count(RelationKind::Prerequisite), 2);
    }

    #[test]
    fn truncated_searches_are_deepened() {
        let records = ["IIC1103", "IIC2233", "ICS1113", "IIQ1003"]
            .into_iter()
            .map(|c| record(c, "No tiene"))
            .collect();
        let source = Truncating {
            inner: FileSource::from_records(records),
            limit: 2,
        };
        let mut catalog = Catalog::default();

        let report = Discovery::new(&config(2)).run(&source, &mut catalog).unwrap();

        assert_eq!(catalog.len(), 4);
        assert_eq!(report.ingested, 4);
        assert!(report.searches > 26);
    }

    #[test]
    fn failed_prefix_is_retried_with_a_new_session() {
        let sessions = Rc::new(Cell::new(0));
        let source = Flaky {
            inner: FileSource::from_records(vec![record("MAT1610", "No tiene")]),
            prefix: "M",
            bad_sessions: 1,
            sessions: Rc::clone(&sessions),
        };
        let mut catalog = Catalog::default();

        let report = Discovery::new(&Config::default())
            .run(&source, &mut catalog)
            .unwrap();

        assert_eq!(sessions.get(), 2);
        assert_eq!(report.retried, 1);
        assert!(report.failures.is_empty());
        assert!(catalog.find(&code("MAT1610")).is_some());
    }

    #[test]
    fn persistent_failure_is_reported_once_retried() {
        let source = Flaky {
            inner: FileSource::from_records(vec![record("MAT1610", "No tiene")]),
            prefix: "M",
            bad_sessions: usize::MAX,
            sessions: Rc::new(Cell::new(0)),
        };
        let mut catalog = Catalog::default();

        let report = Discovery::new(&Config::default())
            .run(&source, &mut catalog)
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "M");
        assert_eq!(
            report.failures[0].reason,
            "cannot search M: source unavailable: connection reset"
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn retry_can_be_disabled() {
        let sessions = Rc::new(Cell::new(0));
        let source = Flaky {
            inner: FileSource::from_records(vec![record("MAT1610", "No tiene")]),
            prefix: "M",
            bad_sessions: 1,
            sessions: Rc::clone(&sessions),
        };
        let mut config = Config::default();
        config.retry_failures = false;

        let report = Discovery::new(&config)
            .run(&source, &mut Catalog::default())
            .unwrap();

        assert_eq!(sessions.get(), 1);
        assert_eq!(report.retried, 0);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn malformed_record_does_not_stop_the_batch() {
        let source = FileSource::from_records(vec![
            record("IIC2233", "IIC1103 y"),
            record("IIC2343", "IIC2233"),
        ]);
        let mut catalog = Catalog::default();

        let report = Discovery::new(&Config::default())
            .run(&source, &mut catalog)
            .unwrap();

        assert_eq!(report.ingested, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "IIC2233");
        assert_eq!(
            catalog.find(&code("IIC2233")).unwrap().status(),
            SubjectStatus::Placeholder
        );
    }

    #[test]
    fn records_are_ingested_once_per_pass() {
        let mut catalog = Catalog::default();
        let mut discovery = Discovery::new(&Config::default());
        let records = vec![record("IIC2233", "No tiene")];

        discovery.ingest_all(&records, &mut catalog);
        discovery.ingest_all(&records, &mut catalog);

        let report = discovery.finish();
        assert_eq!(report.ingested, 1);
    }

    /// Refuses the first `remaining` rows owned by `refused`.
    struct RefusingStore {
        inner: Catalog,
        refused: SubjectCode,
        remaining: usize,
    }

    impl SubjectStore for RefusingStore {
        fn find_by_code(&self, code: &SubjectCode) -> Result<Option<SubjectId>, StoreError> {
            self.inner.find_by_code(code)
        }

        fn create_placeholder(&mut self, code: &SubjectCode) -> Result<SubjectId, StoreError> {
            self.inner.create_placeholder(code)
        }

        fn upsert_subject(
            &mut self,
            code: &SubjectCode,
            data: SubjectData,
        ) -> Result<SubjectId, StoreError> {
            self.inner.upsert_subject(code, data)
        }

        fn clear_group_rows(
            &mut self,
            owner: SubjectId,
            kind: RelationKind,
        ) -> Result<usize, StoreError> {
            self.inner.clear_group_rows(owner, kind)
        }

        fn add_group_row(&mut self, row: GroupRow) -> Result<(), StoreError> {
            if self.remaining > 0 && self.inner.find_by_code(&self.refused)? == Some(row.owner) {
                self.remaining -= 1;
                return Err(StoreError::Backend("row refused".to_string()));
            }
            self.inner.add_group_row(row)
        }

        fn begin(&mut self) -> Result<(), StoreError> {
            self.inner.begin()
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> Result<(), StoreError> {
            self.inner.rollback()
        }
    }

    fn refusing(remaining: usize) -> RefusingStore {
        RefusingStore {
            inner: Catalog::default(),
            refused: code("IIC2233"),
            remaining,
        }
    }

    fn two_subjects() -> FileSource {
        FileSource::from_records(vec![
            record("IIC2233", "IIC1103 o MAT1610"),
            record("MAT1610", "No tiene"),
        ])
    }

    #[test]
    fn store_failure_rolls_back_and_is_reported() {
        let mut store = refusing(usize::MAX);

        let report = Discovery::new(&Config::default())
            .run(&two_subjects(), &mut store)
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.ingested, 1);
        assert_eq!(
            report.failures,
            vec![Failure {
                key: "IIC2233".to_string(),
                reason: "failed to resolve references of IIC2233: store failure: row refused"
                    .to_string(),
            }]
        );

        let catalog = &store.inner;
        assert!(catalog.find(&code("IIC2233")).is_none());
        assert!(catalog.find(&code("IIC1103")).is_none());
        assert_eq!(
            catalog.find(&code("MAT1610")).unwrap().status(),
            SubjectStatus::Resolved
        );
        assert_eq!(catalog.row_count(RelationKind::Prerequisite), 0);
    }

    #[test]
    fn store_failure_is_retried() {
        let mut store = refusing(1);

        let report = Discovery::new(&Config::default())
            .run(&two_subjects(), &mut store)
            .unwrap();

        assert_eq!(report.retried, 1);
        assert!(report.failures.is_empty());
        assert_eq!(
            store.inner.find(&code("IIC2233")).unwrap().status(),
            SubjectStatus::Resolved
        );
        assert_eq!(store.inner.row_count(RelationKind::Prerequisite), 2);
    }

    #[test]
    fn deeply_nested_record_does_not_stop_the_batch() {
        let nested = format!("{}IIC1103{}", "(".repeat(5000), ")".repeat(5000));
        let source = FileSource::from_records(vec![
            record("IIC2233", &nested),
            record("MAT1610", "No tiene"),
        ]);
        let mut catalog = Catalog::default();

        let report = Discovery::new(&Config::default())
            .run(&source, &mut catalog)
            .unwrap();

        assert_eq!(report.ingested, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "IIC2233");
        assert!(report.failures[0].reason.contains("nests deeper than 64 levels"));
        assert!(catalog.find(&code("MAT1610")).is_some());
    }
}
