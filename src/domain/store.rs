//! The persistence seam between the resolver and a concrete store.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{SubjectCode, SubjectData, SubjectId};

/// Which relation a group row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Subjects that must be passed (or taken alongside) first.
    Prerequisite,
    /// Subjects that count as this one.
    Equivalency,
}

impl RelationKind {
    /// Both relation kinds.
    pub const ALL: [Self; 2] = [Self::Prerequisite, Self::Equivalency];
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prerequisite => f.write_str("prerequisite"),
            Self::Equivalency => f.write_str("equivalency"),
        }
    }
}

/// Membership of a referenced subject in one group of an owner's relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupRow {
    /// The subject whose relation this is.
    pub owner: SubjectId,
    /// The subject referenced by the group.
    pub referenced: SubjectId,
    /// Which relation.
    pub kind: RelationKind,
    /// Position of the group in the normalized relation.
    pub group: usize,
    /// Whether the referenced subject may be taken concurrently.
    pub corequisite: bool,
}

/// Errors reported by a [`SubjectStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The id does not belong to any subject.
    #[error("unknown subject {0}")]
    UnknownSubject(SubjectId),

    /// A subject with this code already exists.
    #[error("a subject with code {0} already exists")]
    DuplicateCode(SubjectCode),

    /// A subject with this id already exists.
    #[error("a subject with id {0} already exists")]
    DuplicateId(SubjectId),

    /// A write was attempted outside a transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// A transaction was started while another was in progress.
    #[error("a transaction is already in progress")]
    NestedTransaction,

    /// The backing store failed.
    #[error("store failure: {0}")]
    Backend(String),
}

/// Storage operations needed to resolve subject references.
///
/// Writes happen inside a transaction opened with [`begin`](Self::begin);
/// [`rollback`](Self::rollback) undoes every write since then.
pub trait SubjectStore {
    /// Looks up a subject by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn find_by_code(&self, code: &SubjectCode) -> Result<Option<SubjectId>, StoreError>;

    /// Creates a subject known only by its code.
    ///
    /// # Errors
    ///
    /// Fails if the code already exists or no transaction is open.
    fn create_placeholder(&mut self, code: &SubjectCode) -> Result<SubjectId, StoreError>;

    /// Stores discovered data for a code.
    ///
    /// An existing subject (placeholder or resolved) is updated in place and
    /// keeps its id; otherwise a new subject is created.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open or the backing store fails.
    fn upsert_subject(
        &mut self,
        code: &SubjectCode,
        data: SubjectData,
    ) -> Result<SubjectId, StoreError>;

    /// Removes every row of one relation of `owner`, returning how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Fails if `owner` is unknown or no transaction is open.
    fn clear_group_rows(
        &mut self,
        owner: SubjectId,
        kind: RelationKind,
    ) -> Result<usize, StoreError>;

    /// Adds a group row.
    ///
    /// # Errors
    ///
    /// Fails if either subject is unknown or no transaction is open.
    fn add_group_row(&mut self, row: GroupRow) -> Result<(), StoreError>;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already open.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Makes the writes of the open transaction permanent.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Undoes the writes of the open transaction.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open.
    fn rollback(&mut self) -> Result<(), StoreError>;
}
