//! The on-disk form of a [`Catalog`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Catalog, GroupRow, RelationKind, StoreError, Subject, SubjectCode, SubjectData, SubjectId,
    SubjectState,
};

/// A serializable copy of every subject and row in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotVersion", into = "SnapshotVersion")]
pub struct Snapshot {
    subjects: Vec<StoredSubject>,
    rows: Vec<StoredRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSubject {
    id: SubjectId,
    code: SubjectCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved: Option<Resolved>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Resolved {
    discovered: DateTime<Utc>,
    #[serde(flatten)]
    data: SubjectData,
}

/// Rows refer to subjects by code so the file stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredRow {
    owner: SubjectCode,
    referenced: SubjectCode,
    kind: RelationKind,
    group: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    corequisite: bool,
}

/// Errors that can occur when rebuilding a catalog from a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A row refers to a code with no subject.
    #[error("row of {owner} refers to unknown subject {code}")]
    UnknownCode {
        /// The owner of the row.
        owner: SubjectCode,
        /// The code that could not be found.
        code: SubjectCode,
    },

    /// The subjects and rows are not a valid catalog.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Snapshot {
    /// Captures the current contents of a catalog.
    #[must_use]
    pub fn capture(catalog: &Catalog) -> Self {
        let subjects = catalog
            .iter()
            .map(|subject| StoredSubject {
                id: subject.id,
                code: subject.code.clone(),
                resolved: match &subject.state {
                    SubjectState::Placeholder => None,
                    SubjectState::Resolved { data, discovered } => Some(Resolved {
                        discovered: *discovered,
                        data: data.as_ref().clone(),
                    }),
                },
            })
            .collect();

        let code = |id| {
            catalog
                .subject(id)
                .map(|subject: &Subject| subject.code.clone())
        };
        let rows = catalog
            .all_rows()
            .into_iter()
            .filter_map(|row| {
                Some(StoredRow {
                    owner: code(row.owner)?,
                    referenced: code(row.referenced)?,
                    kind: row.kind,
                    group: row.group,
                    corequisite: row.corequisite,
                })
            })
            .collect();

        Self { subjects, rows }
    }

    /// Number of subjects in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Returns `true` if the snapshot holds no subjects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Rebuilds the catalog.
    ///
    /// # Errors
    ///
    /// Fails if a row refers to an unknown code or two subjects share a code
    /// or an id.
    pub fn restore(self) -> Result<Catalog, SnapshotError> {
        let mut ids = HashMap::with_capacity(self.subjects.len());
        let mut subjects = Vec::with_capacity(self.subjects.len());

        for stored in self.subjects {
            if ids.insert(stored.code.clone(), stored.id).is_some() {
                return Err(StoreError::DuplicateCode(stored.code).into());
            }
            subjects.push(Subject {
                id: stored.id,
                code: stored.code,
                state: match stored.resolved {
                    None => SubjectState::Placeholder,
                    Some(Resolved { discovered, data }) => SubjectState::Resolved {
                        data: Box::new(data),
                        discovered,
                    },
                },
            });
        }

        let lookup = |owner: &SubjectCode, code: &SubjectCode| {
            ids.get(code)
                .copied()
                .ok_or_else(|| SnapshotError::UnknownCode {
                    owner: owner.clone(),
                    code: code.clone(),
                })
        };
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Ok(GroupRow {
                    owner: lookup(&row.owner, &row.owner)?,
                    referenced: lookup(&row.owner, &row.referenced)?,
                    kind: row.kind,
                    group: row.group,
                    corequisite: row.corequisite,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Ok(Catalog::from_parts(subjects, rows)?)
    }
}

/// The serialized versions of the snapshot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum SnapshotVersion {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        subjects: Vec<StoredSubject>,
        #[serde(default)]
        rows: Vec<StoredRow>,
    },
}

impl From<SnapshotVersion> for Snapshot {
    fn from(version: SnapshotVersion) -> Self {
        match version {
            SnapshotVersion::V1 { subjects, rows } => Self { subjects, rows },
        }
    }
}

impl From<Snapshot> for SnapshotVersion {
    fn from(snapshot: Snapshot) -> Self {
        let Snapshot { subjects, rows } = snapshot;
        Self::V1 { subjects, rows }
    }
}
