use std::{collections::BTreeMap, path::PathBuf};

use clap::Parser;
use course_catalog::{Catalog, domain::RelationKind};
use serde::Serialize;
use tracing::instrument;

use super::terminal::{Colorize, is_narrow};

#[derive(Debug, Parser, Default)]
#[command(about = "Show subject counts per school prefix and relation totals")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct Totals {
    prefixes: BTreeMap<String, usize>,
    subjects: usize,
    placeholders: usize,
    prerequisite_rows: usize,
    equivalency_rows: usize,
}

impl Totals {
    fn count(catalog: &Catalog) -> Self {
        let mut prefixes: BTreeMap<String, usize> = BTreeMap::new();
        for subject in catalog.iter() {
            *prefixes.entry(subject.code.prefix().to_string()).or_insert(0) += 1;
        }

        Self {
            prefixes,
            subjects: catalog.len(),
            placeholders: catalog.placeholders().count(),
            prerequisite_rows: catalog.row_count(RelationKind::Prerequisite),
            equivalency_rows: catalog.row_count(RelationKind::Equivalency),
        }
    }
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = super::load(root)?;
        let totals = Totals::count(directory.catalog());

        if totals.subjects == 0 {
            println!("No subjects found yet. Discover some with 'catalogo import'.");
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&totals)?),
            OutputFormat::Table if self.quiet => Self::output_quiet(&totals),
            OutputFormat::Table => Self::output_table(&totals),
        }

        Ok(())
    }

    fn output_quiet(totals: &Totals) {
        println!(
            "subjects={} placeholders={} prerequisites={} equivalencies={}",
            totals.subjects, totals.placeholders, totals.prerequisite_rows, totals.equivalency_rows
        );
    }

    fn output_table(totals: &Totals) {
        println!("Subject counts");
        println!("{}", "──────────────".dim());

        if is_narrow() {
            for (prefix, count) in &totals.prefixes {
                println!("{prefix}: {count}");
            }
            println!("Total: {}", totals.subjects);
        } else {
            println!("{:<10} Count", "Prefix");
            for (prefix, count) in &totals.prefixes {
                println!("{prefix:<10} {count}");
            }
            println!("Total      {}", totals.subjects);
        }

        println!();
        println!("Prerequisite rows: {}", totals.prerequisite_rows);
        println!("Equivalency rows:  {}", totals.equivalency_rows);
        println!();

        if totals.placeholders == 0 {
            println!("Placeholders: {} ✅", "0".success());
        } else {
            println!(
                "Placeholders: {} ⚠️",
                totals.placeholders.to_string().warning()
            );
            println!("{}", "Run 'catalogo validate' to list them.".dim());
        }
    }
}
