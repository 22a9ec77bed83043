//! Domain models for the course catalog.
//!
//! This module contains subject codes, requirement expressions and their
//! normal form, the resolver that turns them into stored relations, and the
//! in-memory catalog.

mod catalog;
pub use catalog::Catalog;

mod code;
pub use code::{InvalidCodeError, SubjectCode};

mod config;
pub use config::Config;

pub mod dnf;
pub use dnf::{Dnf, Group, Normalizer};

pub mod expression;
pub use expression::{Atom, Expr, ParseError};

pub mod restrictions;
pub use restrictions::{Restriction, parse_relationship, parse_restrictions};

mod resolver;
pub use resolver::{ResolutionError, ResolveOutcome, Resolver};

pub mod store;
pub use store::{GroupRow, RelationKind, StoreError, SubjectStore};

mod subject;
pub use subject::{
    Subject, SubjectData, SubjectId, SubjectState, SubjectStatus, description_from_syllabus,
};

mod subject_view;
pub use subject_view::{PrerequisiteRef, SubjectSummary, SubjectView};
