//! In-memory catalog of subjects and their relations.
//!
//! The [`Catalog`] knows nothing about the filesystem. Subjects are stored by
//! id with a separate code index, and group rows live on the edges of a
//! relation graph pointing from owner to referenced subject.

use std::collections::{BTreeMap, HashMap};

use petgraph::{Direction, algo::tarjan_scc, graphmap::DiGraphMap};

use crate::domain::{
    SubjectCode, SubjectData, SubjectId,
    store::{GroupRow, RelationKind, StoreError, SubjectStore},
    subject::Subject,
    subject_view::{PrerequisiteRef, SubjectSummary, SubjectView},
};

/// Data stored on each edge of the relation graph.
///
/// Maps (relation, group index) to the corequisite flag of the row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Links(BTreeMap<(RelationKind, usize), bool>);

impl Links {
    fn has(&self, kind: RelationKind) -> bool {
        self.0.keys().any(|(k, _)| *k == kind)
    }
}

/// A write recorded by an open transaction.
#[derive(Debug, Clone)]
enum Change {
    Inserted(SubjectId),
    Replaced(Box<Subject>),
    RowAdded {
        row: GroupRow,
        previous: Option<bool>,
    },
    RowRemoved(GroupRow),
}

/// An in-memory store of subjects and group rows.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Subjects, keyed by id.
    subjects: HashMap<SubjectId, Subject>,

    /// Code index. `BTreeMap` so iteration is ordered by code.
    codes: BTreeMap<SubjectCode, SubjectId>,

    /// Relation graph. Edges point from owner to referenced subject.
    graph: DiGraphMap<SubjectId, Links>,

    /// Undo log of the open transaction.
    journal: Option<Vec<Change>>,
}

impl Catalog {
    /// Builds a catalog from stored subjects and rows.
    ///
    /// # Errors
    ///
    /// Fails if two subjects share a code or an id, or a row references an
    /// unknown subject.
    pub fn from_parts(
        subjects: impl IntoIterator<Item = Subject>,
        rows: impl IntoIterator<Item = GroupRow>,
    ) -> Result<Self, StoreError> {
        let mut catalog = Self::default();

        for subject in subjects {
            if catalog.codes.contains_key(&subject.code) {
                return Err(StoreError::DuplicateCode(subject.code));
            }
            if catalog.subjects.contains_key(&subject.id) {
                return Err(StoreError::DuplicateId(subject.id));
            }
            catalog.insert(subject);
        }

        for row in rows {
            catalog.check_row(&row)?;
            catalog.insert_row(row);
        }

        Ok(catalog)
    }

    /// Number of subjects, placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Returns `true` if the catalog has no subjects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Looks up a subject by id.
    #[must_use]
    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.get(&id)
    }

    /// Looks up a subject by code.
    #[must_use]
    pub fn find(&self, code: &SubjectCode) -> Option<&Subject> {
        self.codes.get(code).and_then(|id| self.subjects.get(id))
    }

    /// All subjects, ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = &Subject> + '_ {
        self.codes.values().filter_map(|id| self.subjects.get(id))
    }

    /// Codes of every subject that is still a placeholder.
    pub fn placeholders(&self) -> impl Iterator<Item = &SubjectCode> + '_ {
        self.iter()
            .filter(|subject| subject.data().is_none())
            .map(|subject| &subject.code)
    }

    /// Rows of one relation of `owner`, ordered by group and then by the
    /// referenced subject's code.
    #[must_use]
    pub fn rows(&self, owner: SubjectId, kind: RelationKind) -> Vec<GroupRow> {
        if !self.graph.contains_node(owner) {
            return Vec::new();
        }

        let mut rows: Vec<_> = self
            .graph
            .edges(owner)
            .flat_map(|(_, referenced, links)| {
                links
                    .0
                    .iter()
                    .filter(move |((k, _), _)| *k == kind)
                    .map(move |(&(kind, group), &corequisite)| GroupRow {
                        owner,
                        referenced,
                        kind,
                        group,
                        corequisite,
                    })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then_with(|| self.code_of(a.referenced).cmp(&self.code_of(b.referenced)))
        });
        rows
    }

    /// Every row in the catalog, in a stable order.
    #[must_use]
    pub fn all_rows(&self) -> Vec<GroupRow> {
        self.iter()
            .flat_map(|subject| {
                RelationKind::ALL
                    .into_iter()
                    .flat_map(|kind| self.rows(subject.id, kind))
            })
            .collect()
    }

    /// Total number of rows of the given relation.
    #[must_use]
    pub fn row_count(&self, kind: RelationKind) -> usize {
        self.graph
            .all_edges()
            .map(|(_, _, links)| links.0.keys().filter(|(k, _)| *k == kind).count())
            .sum()
    }

    /// Subjects that list `id` in one of their prerequisite groups, ordered
    /// by code.
    #[must_use]
    pub fn unlocks(&self, id: SubjectId) -> Vec<&Subject> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }

        let mut subjects: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .filter(|owner| {
                self.graph
                    .edge_weight(*owner, id)
                    .is_some_and(|links| links.has(RelationKind::Prerequisite))
            })
            .filter_map(|owner| self.subjects.get(&owner))
            .collect();
        subjects.sort_by(|a, b| a.code.cmp(&b.code));
        subjects
    }

    /// Projects a subject and its relations for display.
    #[must_use]
    pub fn view(&self, code: &SubjectCode) -> Option<SubjectView<'_>> {
        let subject = self.find(code)?;
        let data = subject.data();

        let prerequisites = self
            .groups(subject.id, RelationKind::Prerequisite)
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|(subject, corequisite)| PrerequisiteRef {
                        subject: SubjectSummary::from(subject),
                        corequisite,
                    })
                    .collect()
            })
            .collect();

        let equivalencies = self
            .groups(subject.id, RelationKind::Equivalency)
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|(subject, _)| SubjectSummary::from(subject))
                    .collect()
            })
            .collect();

        Some(SubjectView {
            code: &subject.code,
            status: subject.status(),
            name: subject.name(),
            credits: data.map(|data| data.credits),
            school: data.map(|data| data.school.as_str()),
            restrictions: data
                .map(|data| data.restrictions.as_slice())
                .unwrap_or_default(),
            need_all_requirements: data.and_then(|data| data.need_all_requirements),
            prerequisites,
            equivalencies,
            unlocks: self
                .unlocks(subject.id)
                .into_iter()
                .map(SubjectSummary::from)
                .collect(),
        })
    }

    /// Returns every prerequisite cycle as a sorted list of codes.
    ///
    /// Equivalencies are symmetric by nature and are not considered.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<SubjectCode>> {
        let mut prerequisites: DiGraphMap<SubjectId, ()> = DiGraphMap::new();
        for (owner, referenced, links) in self.graph.all_edges() {
            if links.has(RelationKind::Prerequisite) {
                prerequisites.add_edge(owner, referenced, ());
            }
        }

        let mut cycles = Vec::new();

        for component in tarjan_scc(&prerequisites) {
            if component.len() > 1 {
                let mut codes: Vec<_> = component
                    .iter()
                    .filter_map(|id| self.code_of(*id).cloned())
                    .collect();
                codes.sort();
                cycles.push(codes);
                continue;
            }

            let Some(&node) = component.first() else {
                continue;
            };

            if prerequisites.contains_edge(node, node) {
                if let Some(code) = self.code_of(node) {
                    cycles.push(vec![code.clone()]);
                }
            }
        }

        cycles.sort();
        cycles
    }

    /// Removes every subject and row, discarding any open transaction.
    ///
    /// Returns the number of subjects removed.
    pub fn drop_all(&mut self) -> usize {
        let removed = self.subjects.len();
        *self = Self::default();
        tracing::info!(removed, "dropped all subjects");
        removed
    }
}

impl Catalog {
    fn code_of(&self, id: SubjectId) -> Option<&SubjectCode> {
        self.subjects.get(&id).map(|subject| &subject.code)
    }

    fn groups(&self, owner: SubjectId, kind: RelationKind) -> Vec<Vec<(&Subject, bool)>> {
        let mut groups: BTreeMap<usize, Vec<(&Subject, bool)>> = BTreeMap::new();
        for row in self.rows(owner, kind) {
            if let Some(subject) = self.subjects.get(&row.referenced) {
                groups
                    .entry(row.group)
                    .or_default()
                    .push((subject, row.corequisite));
            }
        }
        groups.into_values().collect()
    }

    fn insert(&mut self, subject: Subject) {
        self.graph.add_node(subject.id);
        self.codes.insert(subject.code.clone(), subject.id);
        self.subjects.insert(subject.id, subject);
    }

    fn check_row(&self, row: &GroupRow) -> Result<(), StoreError> {
        for id in [row.owner, row.referenced] {
            if !self.subjects.contains_key(&id) {
                return Err(StoreError::UnknownSubject(id));
            }
        }
        Ok(())
    }

    /// Sets a row, returning the corequisite flag it replaced.
    fn insert_row(&mut self, row: GroupRow) -> Option<bool> {
        if let Some(links) = self.graph.edge_weight_mut(row.owner, row.referenced) {
            return links.0.insert((row.kind, row.group), row.corequisite);
        }

        let mut links = Links::default();
        links.0.insert((row.kind, row.group), row.corequisite);
        self.graph.add_edge(row.owner, row.referenced, links);
        None
    }

    /// Removes a row, dropping the edge once it carries no rows.
    fn remove_row(&mut self, owner: SubjectId, referenced: SubjectId, key: (RelationKind, usize)) {
        let Some(links) = self.graph.edge_weight_mut(owner, referenced) else {
            return;
        };
        links.0.remove(&key);
        if links.0.is_empty() {
            self.graph.remove_edge(owner, referenced);
        }
    }

    fn record(&mut self, change: Change) -> Result<(), StoreError> {
        self.journal
            .as_mut()
            .ok_or(StoreError::NoTransaction)?
            .push(change);
        Ok(())
    }

    const fn ensure_transaction(&self) -> Result<(), StoreError> {
        if self.journal.is_some() {
            Ok(())
        } else {
            Err(StoreError::NoTransaction)
        }
    }

    fn undo(&mut self, change: Change) {
        match change {
            Change::Inserted(id) => {
                if let Some(subject) = self.subjects.remove(&id) {
                    self.codes.remove(&subject.code);
                }
                self.graph.remove_node(id);
            }
            Change::Replaced(previous) => {
                self.subjects.insert(previous.id, *previous);
            }
            Change::RowAdded { row, previous } => match previous {
                Some(corequisite) => {
                    self.insert_row(GroupRow { corequisite, ..row });
                }
                None => self.remove_row(row.owner, row.referenced, (row.kind, row.group)),
            },
            Change::RowRemoved(row) => {
                self.insert_row(row);
            }
        }
    }
}

impl SubjectStore for Catalog {
    fn find_by_code(&self, code: &SubjectCode) -> Result<Option<SubjectId>, StoreError> {
        Ok(self.codes.get(code).copied())
    }

    fn create_placeholder(&mut self, code: &SubjectCode) -> Result<SubjectId, StoreError> {
        self.ensure_transaction()?;
        if self.codes.contains_key(code) {
            return Err(StoreError::DuplicateCode(code.clone()));
        }

        let subject = Subject::placeholder(code.clone());
        let id = subject.id;
        self.insert(subject);
        self.record(Change::Inserted(id))?;
        tracing::debug!(%code, %id, "created placeholder");
        Ok(id)
    }

    fn upsert_subject(
        &mut self,
        code: &SubjectCode,
        data: SubjectData,
    ) -> Result<SubjectId, StoreError> {
        self.ensure_transaction()?;

        if let Some(subject) = self
            .codes
            .get(code)
            .and_then(|id| self.subjects.get_mut(id))
        {
            let previous = Box::new(subject.clone());
            subject.resolve(data);
            let id = subject.id;
            self.record(Change::Replaced(previous))?;
            tracing::debug!(%code, %id, "updated subject");
            return Ok(id);
        }

        let mut subject = Subject::placeholder(code.clone());
        subject.resolve(data);
        let id = subject.id;
        self.insert(subject);
        self.record(Change::Inserted(id))?;
        tracing::debug!(%code, %id, "inserted subject");
        Ok(id)
    }

    fn clear_group_rows(
        &mut self,
        owner: SubjectId,
        kind: RelationKind,
    ) -> Result<usize, StoreError> {
        self.ensure_transaction()?;
        if !self.subjects.contains_key(&owner) {
            return Err(StoreError::UnknownSubject(owner));
        }

        let rows = self.rows(owner, kind);
        for row in &rows {
            self.remove_row(row.owner, row.referenced, (row.kind, row.group));
            self.record(Change::RowRemoved(*row))?;
        }
        Ok(rows.len())
    }

    fn add_group_row(&mut self, row: GroupRow) -> Result<(), StoreError> {
        self.ensure_transaction()?;
        self.check_row(&row)?;

        let previous = self.insert_row(row);
        self.record(Change::RowAdded { row, previous })
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.journal.is_some() {
            return Err(StoreError::NestedTransaction);
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.journal.take().ok_or(StoreError::NoTransaction)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let journal = self.journal.take().ok_or(StoreError::NoTransaction)?;
        tracing::debug!(changes = journal.len(), "rolling back");
        for change in journal.into_iter().rev() {
            self.undo(change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(code: &str) -> SubjectCode {
        SubjectCode::new(code).unwrap()
    }

    fn data(name: &str) -> SubjectData {
        SubjectData {
            name: name.to_string(),
            credits: 10,
            school: "Ingeniería".to_string(),
            academic_level: "Pregrado".to_string(),
            description: None,
            syllabus: String::new(),
            restrictions: Vec::new(),
            prerequisites_raw: "No tiene".to_string(),
            equivalencies_raw: "No tiene".to_string(),
            need_all_requirements: Some(false),
            is_active: true,
        }
    }

    fn row(owner: SubjectId, referenced: SubjectId, group: usize) -> GroupRow {
        GroupRow {
            owner,
            referenced,
            kind: RelationKind::Prerequisite,
            group,
            corequisite: false,
        }
    }

    /// A committed catalog with the given placeholders.
    fn catalog_with(codes: &[&str]) -> (Catalog, Vec<SubjectId>) {
        let mut catalog = Catalog::default();
        catalog.begin().unwrap();
        let ids = codes
            .iter()
            .map(|c| catalog.create_placeholder(&code(c)).unwrap())
            .collect();
        catalog.commit().unwrap();
        (catalog, ids)
    }

    #[test]
    fn writes_require_a_transaction() {
        let mut catalog = Catalog::default();
        assert_eq!(
            catalog.create_placeholder(&code("A1")),
            Err(StoreError::NoTransaction)
        );
        assert_eq!(catalog.commit(), Err(StoreError::NoTransaction));
        assert_eq!(catalog.rollback(), Err(StoreError::NoTransaction));

        catalog.begin().unwrap();
        assert_eq!(catalog.begin(), Err(StoreError::NestedTransaction));
    }

    #[test]
    fn duplicate_placeholder_is_rejected() {
        let (mut catalog, _) = catalog_with(&["A1"]);
        catalog.begin().unwrap();
        assert_eq!(
            catalog.create_placeholder(&code("A1")),
            Err(StoreError::DuplicateCode(code("A1")))
        );
    }

    #[test]
    fn upsert_fills_placeholder_in_place() {
        let (mut catalog, ids) = catalog_with(&["A1"]);

        catalog.begin().unwrap();
        let id = catalog.upsert_subject(&code("A1"), data("Álgebra")).unwrap();
        catalog.commit().unwrap();

        assert_eq!(id, ids[0]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find(&code("A1")).unwrap().name(), Some("Álgebra"));
        assert_eq!(catalog.placeholders().count(), 0);
    }

    #[test]
    fn rollback_undoes_every_change() {
        let (mut catalog, ids) = catalog_with(&["A1", "B1"]);
        catalog.begin().unwrap();
        catalog.add_group_row(row(ids[0], ids[1], 0)).unwrap();
        catalog.commit().unwrap();

        catalog.begin().unwrap();
        catalog.upsert_subject(&code("A1"), data("Álgebra")).unwrap();
        let c1 = catalog.create_placeholder(&code("C1")).unwrap();
        catalog
            .clear_group_rows(ids[0], RelationKind::Prerequisite)
            .unwrap();
        catalog.add_group_row(row(ids[0], c1, 0)).unwrap();
        catalog
            .add_group_row(GroupRow {
                corequisite: true,
                ..row(ids[0], c1, 0)
            })
            .unwrap();
        catalog.rollback().unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.find(&code("C1")).is_none());
        assert_eq!(catalog.find(&code("A1")).unwrap().name(), None);
        assert_eq!(
            catalog.rows(ids[0], RelationKind::Prerequisite),
            vec![row(ids[0], ids[1], 0)]
        );
        assert_eq!(catalog.row_count(RelationKind::Prerequisite), 1);
    }

    #[test]
    fn clear_only_touches_one_relation() {
        let (mut catalog, ids) = catalog_with(&["A1", "B1"]);
        catalog.begin().unwrap();
        catalog.add_group_row(row(ids[0], ids[1], 0)).unwrap();
        catalog
            .add_group_row(GroupRow {
                kind: RelationKind::Equivalency,
                ..row(ids[0], ids[1], 0)
            })
            .unwrap();
        let cleared = catalog
            .clear_group_rows(ids[0], RelationKind::Prerequisite)
            .unwrap();
        catalog.commit().unwrap();

        assert_eq!(cleared, 1);
        assert_eq!(catalog.row_count(RelationKind::Prerequisite), 0);
        assert_eq!(catalog.row_count(RelationKind::Equivalency), 1);
        assert!(catalog.unlocks(ids[1]).is_empty());
    }

    #[test]
    fn rows_to_unknown_subjects_are_rejected() {
        let (mut catalog, ids) = catalog_with(&["A1"]);
        let stranger = SubjectId::new();
        catalog.begin().unwrap();
        assert_eq!(
            catalog.add_group_row(row(ids[0], stranger, 0)),
            Err(StoreError::UnknownSubject(stranger))
        );
    }

    #[test]
    fn view_groups_rows_and_lists_unlocks() {
        let (mut catalog, ids) = catalog_with(&["A1", "B1", "C1", "D1"]);
        let [a, b, c, d] = [ids[0], ids[1], ids[2], ids[3]];

        catalog.begin().unwrap();
        catalog.upsert_subject(&code("D1"), data("Destino")).unwrap();
        catalog.add_group_row(row(d, b, 0)).unwrap();
        catalog.add_group_row(row(d, a, 0)).unwrap();
        catalog
            .add_group_row(GroupRow {
                corequisite: true,
                ..row(d, c, 1)
            })
            .unwrap();
        catalog
            .add_group_row(GroupRow {
                kind: RelationKind::Equivalency,
                ..row(d, c, 0)
            })
            .unwrap();
        catalog.commit().unwrap();

        let view = catalog.view(&code("D1")).unwrap();
        assert_eq!(view.name, Some("Destino"));
        let groups: Vec<Vec<(&str, bool)>> = view
            .prerequisites
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|r| (r.subject.code.as_str(), r.corequisite))
                    .collect()
            })
            .collect();
        assert_eq!(
            groups,
            vec![vec![("A1", false), ("B1", false)], vec![("C1", true)]]
        );
        assert_eq!(view.equivalencies.len(), 1);
        assert!(view.unlocks.is_empty());

        let a_view = catalog.view(&code("A1")).unwrap();
        assert_eq!(a_view.unlocks.len(), 1);
        assert_eq!(a_view.unlocks[0].code.as_str(), "D1");
        assert_eq!(catalog.unlocks(c).len(), 1);
        assert_eq!(catalog.unlocks(b)[0].code.as_str(), "D1");
    }

    #[test]
    fn detects_prerequisite_cycles() {
        let (mut catalog, ids) = catalog_with(&["A1", "B1", "C1"]);
        catalog.begin().unwrap();
        catalog.add_group_row(row(ids[0], ids[1], 0)).unwrap();
        catalog.add_group_row(row(ids[1], ids[0], 0)).unwrap();
        catalog.add_group_row(row(ids[2], ids[2], 0)).unwrap();
        catalog
            .add_group_row(GroupRow {
                kind: RelationKind::Equivalency,
                ..row(ids[2], ids[0], 0)
            })
            .unwrap();
        catalog
            .add_group_row(GroupRow {
                kind: RelationKind::Equivalency,
                ..row(ids[0], ids[2], 0)
            })
            .unwrap();
        catalog.commit().unwrap();

        assert_eq!(
            catalog.cycles(),
            vec![vec![code("A1"), code("B1")], vec![code("C1")]]
        );
    }

    #[test]
    fn from_parts_validates_references() {
        let a = Subject::placeholder(code("A1"));
        let b = Subject::placeholder(code("B1"));
        let rows = vec![row(a.id, b.id, 0)];

        let catalog = Catalog::from_parts(vec![a.clone(), b], rows).unwrap();
        assert_eq!(catalog.all_rows().len(), 1);

        let err = Catalog::from_parts(vec![a.clone()], vec![row(a.id, SubjectId::new(), 0)]);
        assert!(matches!(err, Err(StoreError::UnknownSubject(_))));

        let duplicate = Subject::placeholder(code("A1"));
        let err = Catalog::from_parts(vec![a, duplicate], Vec::new());
        assert_eq!(err.unwrap_err(), StoreError::DuplicateCode(code("A1")));
    }

    #[test]
    fn drop_all_empties_the_catalog() {
        let (mut catalog, _) = catalog_with(&["A1", "B1"]);
        assert_eq!(catalog.drop_all(), 2);
        assert!(catalog.is_empty());
        assert_eq!(catalog.iter().count(), 0);
    }
}
