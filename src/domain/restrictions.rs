//! Flat restriction lists and the requirement/equivalency relation.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::expression::is_no_requirements;

static RESTRICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*([^(]*?)\s*=\s*([^)]*?)\s*\)").expect("restriction pattern is valid")
});

/// A `key = value` enrollment restriction, such as `(Nivel = Pregrado)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    /// What is restricted.
    pub key: String,
    /// The required value.
    pub value: String,
}

impl Restriction {
    /// Creates a restriction.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Parses `(key1 = val1)(key2 = val2)...`.
///
/// Returns an empty list for the "no requirements" sentinel and `None` when
/// the text contains no restriction at all.
#[must_use]
pub fn parse_restrictions(text: &str) -> Option<Vec<Restriction>> {
    if is_no_requirements(text) {
        return Some(Vec::new());
    }

    let restrictions: Vec<_> = RESTRICTION
        .captures_iter(text)
        .map(|captures| Restriction::new(&captures[1], &captures[2]))
        .collect();

    if restrictions.is_empty() {
        None
    } else {
        Some(restrictions)
    }
}

/// Parses the relation between the requirement and equivalency groups.
///
/// `y` means every requirement must be met (`Some(true)`); `o` and the
/// sentinel mean either suffices (`Some(false)`). Anything else is unknown.
#[must_use]
pub fn parse_relationship(text: &str) -> Option<bool> {
    match text.trim() {
        "y" => Some(true),
        "o" => Some(false),
        other if is_no_requirements(other) => Some(false),
        _ => None,
    }
}
