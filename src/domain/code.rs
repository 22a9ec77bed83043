use std::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};

/// A validated subject code, such as `IIC2233` or `MAT1610`.
///
/// Format: one or more uppercase ASCII letters, followed by one or more
/// digits, optionally followed by a single uppercase letter (`ICS1113A`).
///
/// The lowercase corequisite marker used in requirement text is never part
/// of a code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectCode(String);

impl SubjectCode {
    /// Creates a new `SubjectCode` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCodeError`] if the string does not match the subject
    /// code format.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidCodeError> {
        let s = s.into();
        if is_subject_code(&s) {
            Ok(Self(s))
        } else {
            Err(InvalidCodeError(s))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the leading alphabetic part of the code (the school prefix).
    ///
    /// For example `IIC` for `IIC2233`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        let end = self
            .0
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

fn is_subject_code(s: &str) -> bool {
    let bytes = s.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    let digits = bytes[letters..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();

    match &bytes[letters + digits..] {
        [] => letters > 0 && digits > 0,
        [suffix] => letters > 0 && digits > 0 && suffix.is_ascii_uppercase(),
        _ => false,
    }
}

impl TryFrom<String> for SubjectCode {
    type Error = InvalidCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SubjectCode {
    type Error = InvalidCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectCode> for String {
    fn from(code: SubjectCode) -> Self {
        code.0
    }
}

impl AsRef<str> for SubjectCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SubjectCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for SubjectCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SubjectCode {
    type Err = InvalidCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when a string is not a valid subject code.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("Invalid subject code '{0}': expected uppercase letters followed by digits (e.g. IIC2233)")]
pub struct InvalidCodeError(pub String);
