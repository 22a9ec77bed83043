use std::{path::PathBuf, process};

use anyhow::Context;
use clap::Parser;
use course_catalog::{Discovery, DiscoveryReport, FileSource};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Discover subjects from a JSON or YAML dump of scraped records")]
pub struct Import {
    /// The dump to read. Files ending in `.json` are read as JSON, anything
    /// else as YAML.
    file: PathBuf,

    /// Drop every stored subject and relation before importing
    #[arg(long)]
    fresh: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Import {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let source = FileSource::open(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        tracing::info!(records = source.len(), "Opened {}", self.file.display());

        let mut directory = super::load(root)?;

        if self.fresh {
            let dropped = directory.catalog_mut().drop_all();
            println!("Dropped {dropped} subjects");
        }

        let discovery = Discovery::new(directory.config());
        let report = discovery.run(&source, directory.catalog_mut())?;

        directory.flush().context("Failed to save catalog")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            Self::output_summary(&report);
        }

        if !report.failures.is_empty() {
            process::exit(2);
        }
        Ok(())
    }

    fn output_summary(report: &DiscoveryReport) {
        println!(
            "Ingested {} subjects from {} searches ({} records found)",
            report.ingested.to_string().success(),
            report.searches,
            report.found
        );
        if report.placeholders > 0 {
            println!(
                "Created {} placeholders for referenced subjects",
                report.placeholders
            );
        }
        if report.retried > 0 {
            println!("Retried {} failed prefixes or codes", report.retried);
        }

        if report.failures.is_empty() {
            println!("Failures: {} ✅", "0".success());
        } else {
            println!(
                "Failures: {} ⚠️",
                report.failures.len().to_string().warning()
            );
            for failure in &report.failures {
                println!("  - {}: {}", failure.key, failure.reason.dim());
            }
        }
    }
}
