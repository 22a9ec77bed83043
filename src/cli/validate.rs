use std::{path::PathBuf, process};

use clap::Parser;
use course_catalog::{Catalog, SubjectCode};
use serde::Serialize;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Check for prerequisite cycles and subjects never discovered")]
pub struct Validate {
    /// Print the findings as JSON
    #[arg(long)]
    json: bool,

    /// Only fail on prerequisite cycles
    #[arg(long)]
    allow_placeholders: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct Findings<'a> {
    cycles: Vec<Vec<SubjectCode>>,
    placeholders: Vec<&'a SubjectCode>,
}

impl<'a> Findings<'a> {
    fn collect(catalog: &'a Catalog) -> Self {
        Self {
            cycles: catalog.cycles(),
            placeholders: catalog.placeholders().collect(),
        }
    }

    /// Exit code for the findings: 3 for cycles, 2 for placeholders.
    fn exit_code(&self, allow_placeholders: bool) -> i32 {
        if !self.cycles.is_empty() {
            3
        } else if !allow_placeholders && !self.placeholders.is_empty() {
            2
        } else {
            0
        }
    }
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = super::load(root)?;
        let findings = Findings::collect(directory.catalog());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&findings)?);
        } else {
            Self::output_report(&findings);
        }

        let exit_code = findings.exit_code(self.allow_placeholders);
        if exit_code != 0 {
            process::exit(exit_code);
        }
        Ok(())
    }

    fn output_report(findings: &Findings<'_>) {
        const MAX_DISPLAY: usize = 10;

        if findings.cycles.is_empty() {
            println!("Cycles: {} ✅", "0".success());
        } else {
            println!("Cycles: {} ⚠️", findings.cycles.len().to_string().warning());
            for cycle in findings.cycles.iter().take(MAX_DISPLAY) {
                let codes: Vec<_> = cycle.iter().map(SubjectCode::as_str).collect();
                println!("  - {}", codes.join(" -> "));
            }
            if findings.cycles.len() > MAX_DISPLAY {
                println!("  - ... and {} more", findings.cycles.len() - MAX_DISPLAY);
            }
        }

        if findings.placeholders.is_empty() {
            println!("Placeholders: {} ✅", "0".success());
        } else {
            println!(
                "Placeholders: {} ⚠️",
                findings.placeholders.len().to_string().warning()
            );
            for code in findings.placeholders.iter().take(MAX_DISPLAY) {
                println!("  - {code}");
            }
            if findings.placeholders.len() > MAX_DISPLAY {
                println!(
                    "  - ... and {} more",
                    findings.placeholders.len() - MAX_DISPLAY
                );
            }
            println!(
                "{}",
                "Referenced subjects that were never discovered.".dim()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use course_catalog::{Dnf, Resolver, domain::RelationKind};

    use super::*;

    fn code(code: &str) -> SubjectCode {
        SubjectCode::new(code).unwrap()
    }

    fn link(catalog: &mut Catalog, owner: &str, text: &str) {
        Resolver::new(catalog)
            .resolve(&code(owner), RelationKind::Prerequisite, &Dnf::parse(text).unwrap())
            .unwrap();
    }

    #[test]
    fn empty_catalog_is_healthy() {
        let catalog = Catalog::default();
        assert_eq!(Findings::collect(&catalog).exit_code(false), 0);
    }

    #[test]
    fn placeholders_fail_unless_allowed() {
        let mut catalog = Catalog::default();
        link(&mut catalog, "IIC2233", "IIC1103");

        let findings = Findings::collect(&catalog);
        assert_eq!(findings.placeholders.len(), 2);
        assert_eq!(findings.exit_code(false), 2);
        assert_eq!(findings.exit_code(true), 0);
    }

    #[test]
    fn cycles_take_precedence() {
        let mut catalog = Catalog::default();
        link(&mut catalog, "IIC2233", "IIC1103");
        link(&mut catalog, "IIC1103", "IIC2233");

        let findings = Findings::collect(&catalog);
        assert_eq!(findings.cycles, vec![vec![code("IIC1103"), code("IIC2233")]]);
        assert_eq!(findings.exit_code(true), 3);
    }
}
