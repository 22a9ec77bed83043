use serde::{Deserialize, Serialize};

use crate::{
    discovery::DiscoveryError,
    domain::{
        Dnf, Normalizer, SubjectCode, SubjectData, description_from_syllabus,
        expression::NO_REQUIREMENTS, parse_relationship, parse_restrictions,
    },
};

/// A subject record as scraped from the catalog site.
///
/// Requirement, equivalency, relationship and restriction fields hold the
/// catalog's raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedSubject {
    /// Subject code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// The school offering the subject.
    #[serde(default)]
    pub school_name: String,
    /// Academic level.
    #[serde(default)]
    pub level: String,
    /// Credit count.
    #[serde(default)]
    pub credits: u32,
    /// Whether the subject is currently offered.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Description, when the listing has one.
    #[serde(default)]
    pub description: Option<String>,
    /// Full syllabus text.
    #[serde(default)]
    pub syllabus: String,
    /// Prerequisite expression.
    #[serde(default = "no_requirements")]
    pub prerequisites_raw: String,
    /// Equivalency expression.
    #[serde(default = "no_requirements")]
    pub equivalencies_raw: String,
    /// Relation between prerequisites and restrictions (`y` or `o`).
    #[serde(default = "no_requirements")]
    pub relationship: String,
    /// Restriction list, `(key = value)...`.
    #[serde(default = "no_requirements")]
    pub restrictions: String,
}

/// A scraped record after parsing, ready to be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    /// Subject code.
    pub code: SubjectCode,
    /// Catalog data to store.
    pub data: SubjectData,
    /// Normalized prerequisites.
    pub prerequisites: Dnf,
    /// Normalized equivalencies.
    pub equivalencies: Dnf,
}

const fn default_true() -> bool {
    true
}

fn no_requirements() -> String {
    NO_REQUIREMENTS.to_string()
}

impl ScrapedSubject {
    /// Parses the raw fields of the record.
    ///
    /// An unrecognised relationship or restriction text is logged and
    /// stored as unknown; it does not fail the record.
    ///
    /// # Errors
    ///
    /// Fails if the code is invalid or either expression is malformed.
    pub fn parse(&self, normalizer: &Normalizer) -> Result<ParsedSubject, DiscoveryError> {
        let code =
            SubjectCode::new(self.code.trim()).map_err(|source| DiscoveryError::InvalidCode {
                code: self.code.clone(),
                source,
            })?;

        let expression = |field: &'static str, text: &str| {
            normalizer
                .parse(text)
                .map_err(|source| DiscoveryError::Parse {
                    code: code.clone(),
                    field,
                    source,
                })
        };
        let prerequisites = expression("prerequisites", &self.prerequisites_raw)?;
        let equivalencies = expression("equivalencies", &self.equivalencies_raw)?;

        let need_all_requirements = parse_relationship(&self.relationship);
        if need_all_requirements.is_none() {
            tracing::warn!(%code, relationship = %self.relationship, "unknown relationship");
        }

        let restrictions = parse_restrictions(&self.restrictions).unwrap_or_else(|| {
            tracing::warn!(%code, restrictions = %self.restrictions, "unrecognised restrictions");
            Vec::new()
        });

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .map(ToString::to_string)
            .or_else(|| description_from_syllabus(&self.syllabus));

        Ok(ParsedSubject {
            data: SubjectData {
                name: self.name.trim().to_string(),
                credits: self.credits,
                school: self.school_name.trim().to_string(),
                academic_level: self.level.trim().to_string(),
                description,
                syllabus: self.syllabus.clone(),
                restrictions,
                prerequisites_raw: self.prerequisites_raw.clone(),
                equivalencies_raw: self.equivalencies_raw.clone(),
                need_all_requirements,
                is_active: self.is_active,
            },
            code,
            prerequisites,
            equivalencies,
        })
    }
}
