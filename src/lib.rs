//! Course catalog discovery
//!
//! Subjects are discovered from a catalog source, their requirement text is
//! parsed into disjunctive normal form and every referenced subject is
//! resolved into a persistent catalog.

pub mod domain;
pub use domain::{
    Catalog, Config, Dnf, Normalizer, Resolver, Subject, SubjectCode, SubjectStore, SubjectView,
};

pub mod discovery;
pub use discovery::{Discovery, DiscoveryReport, FileSource};

/// Filesystem persistence for the catalog and its configuration.
pub mod storage;
pub use storage::Directory;
