use std::path::PathBuf;

mod import;
mod init;
mod parse;
mod show;
mod status;
mod terminal;
mod validate;

use anyhow::Context;
use clap::ArgAction;
use course_catalog::{Directory, SubjectCode, storage::directory::Loaded};
use import::Import;
use init::Init;
use parse::Parse;
use show::Show;
use status::Status;
use validate::Validate;

/// Parse a subject code, normalizing to uppercase.
fn parse_code(s: &str) -> Result<SubjectCode, String> {
    SubjectCode::new(s.trim().to_uppercase()).map_err(|e| e.to_string())
}

/// Load the catalog under `root`.
fn load(root: PathBuf) -> anyhow::Result<Directory<Loaded>> {
    let display = root.display().to_string();
    Directory::new(root)
        .load()
        .with_context(|| format!("Failed to load catalog in {display}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The directory holding the catalog
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show catalog totals (default)
    Status(Status),

    /// Write a default configuration file
    Init(Init),

    /// Parse and normalize a requirement expression
    Parse(Parse),

    /// Discover subjects from a dump of scraped records
    ///
    /// Every prefix of the code space is searched and each record found is
    /// stored along with its prerequisite and equivalency groups.
    Import(Import),

    /// Show a subject and its relations
    Show(Show),

    /// Check the catalog for prerequisite cycles and unresolved subjects
    Validate(Validate),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init(command) => command.run(&root)?,
            Self::Parse(command) => command.run(&root)?,
            Self::Import(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Validate(command) => command.run(root)?,
        }
        Ok(())
    }
}
