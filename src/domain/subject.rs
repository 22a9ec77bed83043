use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{SubjectCode, restrictions::Restriction};

/// Stable identity of a subject in the catalog.
///
/// A placeholder keeps its id when it is later resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SubjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a subject has been discovered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    /// Referenced by another subject but never discovered.
    Placeholder,
    /// Discovered, with full catalog data.
    Resolved,
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => f.write_str("placeholder"),
            Self::Resolved => f.write_str("resolved"),
        }
    }
}

/// Catalog data of a discovered subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectData {
    /// Display name.
    pub name: String,
    /// Credit count.
    pub credits: u32,
    /// The school offering the subject.
    pub school: String,
    /// Academic level, such as `Pregrado`.
    pub academic_level: String,
    /// Short description, usually taken from the syllabus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Full syllabus text.
    #[serde(default)]
    pub syllabus: String,
    /// Enrollment restrictions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
    /// Prerequisite text as found in the catalog.
    pub prerequisites_raw: String,
    /// Equivalency text as found in the catalog.
    pub equivalencies_raw: String,
    /// Whether prerequisites and restrictions must all be met.
    ///
    /// `None` when the catalog's relation text was not understood.
    #[serde(default)]
    pub need_all_requirements: Option<bool>,
    /// Whether the subject is currently offered.
    pub is_active: bool,
}

/// The lifecycle state of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectState {
    /// Only the code is known.
    Placeholder,
    /// Fully discovered.
    Resolved {
        /// Catalog data.
        data: Box<SubjectData>,
        /// When the subject was last discovered.
        discovered: DateTime<Utc>,
    },
}

/// A subject in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Stable identity.
    pub id: SubjectId,
    /// Unique subject code.
    pub code: SubjectCode,
    /// Placeholder or resolved data.
    pub state: SubjectState,
}

impl Subject {
    /// A subject known only by its code.
    #[must_use]
    pub fn placeholder(code: SubjectCode) -> Self {
        Self {
            id: SubjectId::new(),
            code,
            state: SubjectState::Placeholder,
        }
    }

    /// Returns whether the subject has been discovered.
    #[must_use]
    pub const fn status(&self) -> SubjectStatus {
        match self.state {
            SubjectState::Placeholder => SubjectStatus::Placeholder,
            SubjectState::Resolved { .. } => SubjectStatus::Resolved,
        }
    }

    /// Catalog data, if resolved.
    #[must_use]
    pub fn data(&self) -> Option<&SubjectData> {
        match &self.state {
            SubjectState::Placeholder => None,
            SubjectState::Resolved { data, .. } => Some(data.as_ref()),
        }
    }

    /// When the subject was last discovered, if ever.
    #[must_use]
    pub const fn discovered(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            SubjectState::Placeholder => None,
            SubjectState::Resolved { discovered, .. } => Some(*discovered),
        }
    }

    /// Display name, if resolved.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.data().map(|data| data.name.as_str())
    }

    /// Replaces the state with discovered data, keeping id and code.
    pub fn resolve(&mut self, data: SubjectData) {
        self.state = SubjectState::Resolved {
            data: Box::new(data),
            discovered: Utc::now(),
        };
    }
}

/// Extracts a description from a syllabus.
///
/// The description is the text after the line that contains `DESCRIP`, up to
/// the next `II` heading (or the end of the syllabus).
#[must_use]
pub fn description_from_syllabus(syllabus: &str) -> Option<String> {
    let heading = syllabus.find("DESCRIP")?;
    let start = syllabus[heading..]
        .find('\n')
        .map_or(syllabus.len(), |offset| heading + offset);
    let end = syllabus[start..]
        .find("II")
        .map_or(syllabus.len(), |offset| start + offset);

    let description = syllabus[start..end].trim();
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}
