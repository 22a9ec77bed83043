//! Turns normalized relations into group rows.

use thiserror::Error;
use tracing::instrument;

use crate::domain::{
    SubjectCode, SubjectData, SubjectId,
    dnf::Dnf,
    store::{GroupRow, RelationKind, StoreError, SubjectStore},
};

/// A store failure while resolving one owner. Every change made for the
/// owner has been rolled back.
#[derive(Debug, Error)]
#[error("failed to resolve references of {owner}")]
pub struct ResolutionError {
    /// The subject whose relations were being written.
    pub owner: SubjectCode,
    /// What the store reported.
    #[source]
    pub source: StoreError,
}

/// What resolving an owner wrote to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOutcome {
    /// The owner's id.
    pub owner: Option<SubjectId>,
    /// Rows written.
    pub rows: usize,
    /// Placeholders created for codes not yet in the store.
    pub placeholders: usize,
    /// Rows removed before writing.
    pub cleared: usize,
}

impl ResolveOutcome {
    fn merge(&mut self, other: Self) {
        self.owner = other.owner.or(self.owner);
        self.rows += other.rows;
        self.placeholders += other.placeholders;
        self.cleared += other.cleared;
    }
}

/// Writes normalized relations into a [`SubjectStore`].
///
/// Every public operation runs in its own transaction.
#[derive(Debug)]
pub struct Resolver<'s, S> {
    store: &'s mut S,
}

impl<'s, S> Resolver<'s, S>
where
    S: SubjectStore,
{
    /// Creates a resolver writing to `store`.
    pub const fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Replaces one relation of `owner` with the groups of `dnf`.
    ///
    /// The owner is created as a placeholder if it is not in the store yet.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] if the store fails; nothing is changed
    /// in that case.
    #[instrument(level = "debug", skip(self, owner, dnf), fields(owner = %owner))]
    pub fn resolve(
        &mut self,
        owner: &SubjectCode,
        kind: RelationKind,
        dnf: &Dnf,
    ) -> Result<ResolveOutcome, ResolutionError> {
        self.transaction(owner, |store| {
            let (id, created) = find_or_create(store, owner)?;
            let mut outcome = write_groups(store, id, kind, dnf)?;
            outcome.placeholders += usize::from(created);
            Ok(outcome)
        })
    }

    /// Stores a discovered subject and both of its relations.
    ///
    /// An existing placeholder for `owner` is filled in place.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] if the store fails; nothing is changed
    /// in that case.
    #[instrument(
        level = "debug",
        skip(self, owner, data, prerequisites, equivalencies),
        fields(owner = %owner)
    )]
    pub fn ingest(
        &mut self,
        owner: &SubjectCode,
        data: SubjectData,
        prerequisites: &Dnf,
        equivalencies: &Dnf,
    ) -> Result<ResolveOutcome, ResolutionError> {
        self.transaction(owner, |store| {
            let id = store.upsert_subject(owner, data)?;
            let mut outcome = write_groups(store, id, RelationKind::Prerequisite, prerequisites)?;
            outcome.merge(write_groups(
                store,
                id,
                RelationKind::Equivalency,
                equivalencies,
            )?);
            Ok(outcome)
        })
    }

    fn transaction<F>(
        &mut self,
        owner: &SubjectCode,
        f: F,
    ) -> Result<ResolveOutcome, ResolutionError>
    where
        F: FnOnce(&mut S) -> Result<ResolveOutcome, StoreError>,
    {
        let error = |source| ResolutionError {
            owner: owner.clone(),
            source,
        };

        self.store.begin().map_err(error)?;

        match f(&mut *self.store).and_then(|outcome| self.store.commit().map(|()| outcome)) {
            Ok(outcome) => Ok(outcome),
            Err(source) => {
                if let Err(rollback) = self.store.rollback() {
                    tracing::error!(%owner, %rollback, "rollback failed");
                }
                Err(error(source))
            }
        }
    }
}

fn find_or_create<S: SubjectStore>(
    store: &mut S,
    code: &SubjectCode,
) -> Result<(SubjectId, bool), StoreError> {
    if let Some(id) = store.find_by_code(code)? {
        return Ok((id, false));
    }
    tracing::warn!(%code, "not discovered yet, creating placeholder");
    Ok((store.create_placeholder(code)?, true))
}

fn write_groups<S: SubjectStore>(
    store: &mut S,
    owner: SubjectId,
    kind: RelationKind,
    dnf: &Dnf,
) -> Result<ResolveOutcome, StoreError> {
    let mut outcome = ResolveOutcome {
        owner: Some(owner),
        cleared: store.clear_group_rows(owner, kind)?,
        ..ResolveOutcome::default()
    };

    for (group, atoms) in dnf.iter().enumerate() {
        for atom in atoms {
            let (referenced, created) = find_or_create(store, &atom.code)?;
            outcome.placeholders += usize::from(created);
            store.add_group_row(GroupRow {
                owner,
                referenced,
                kind,
                group,
                corequisite: atom.corequisite,
            })?;
            outcome.rows += 1;
        }
    }

    Ok(outcome)
}
