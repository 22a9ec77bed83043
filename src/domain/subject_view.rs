// SubjectView - a borrowed projection of a subject and its relations.

use serde::Serialize;

use crate::domain::{
    SubjectCode, SubjectStatus, restrictions::Restriction, subject::Subject,
};

/// The minimal descriptor of a related subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary<'a> {
    /// The subject's code.
    pub code: &'a SubjectCode,
    /// The subject's name, unknown for placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl<'a> From<&'a Subject> for SubjectSummary<'a> {
    fn from(subject: &'a Subject) -> Self {
        Self {
            code: &subject.code,
            name: subject.name(),
        }
    }
}

/// A subject referenced from a prerequisite group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteRef<'a> {
    /// The referenced subject.
    #[serde(flatten)]
    pub subject: SubjectSummary<'a>,
    /// Whether it may be taken concurrently.
    pub corequisite: bool,
}

/// A borrowed view of a subject, suitable for serialization.
///
/// Relations are rebuilt from the catalog's graph when the view is created.
/// Each inner list is one AND-group; satisfying any group satisfies the
/// relation.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectView<'a> {
    /// The subject's code.
    pub code: &'a SubjectCode,
    /// Placeholder or resolved.
    pub status: SubjectStatus,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    /// Credit count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    /// The school offering the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<&'a str>,
    /// Enrollment restrictions.
    pub restrictions: &'a [Restriction],
    /// Whether prerequisites and restrictions must all be met.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub need_all_requirements: Option<bool>,
    /// Prerequisite groups.
    pub prerequisites: Vec<Vec<PrerequisiteRef<'a>>>,
    /// Equivalency groups.
    pub equivalencies: Vec<Vec<SubjectSummary<'a>>>,
    /// Subjects that list this one as a prerequisite.
    pub unlocks: Vec<SubjectSummary<'a>>,
}
