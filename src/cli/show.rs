use std::{path::PathBuf, process};

use clap::Parser;
use course_catalog::{SubjectCode, SubjectView, domain::SubjectStatus};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Display a subject with its requirements and the subjects it unlocks")]
pub struct Show {
    /// The code of the subject to display
    #[clap(value_parser = super::parse_code)]
    code: SubjectCode,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = super::load(root)?;

        let Some(view) = directory.catalog().view(&self.code) else {
            eprintln!("Subject {} not found", self.code);
            process::exit(1);
        };

        match self.output {
            OutputFormat::Pretty => Self::output_pretty(&view),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        }

        Ok(())
    }

    fn output_pretty(view: &SubjectView<'_>) {
        println!("# {}", view.code);
        match view.name {
            Some(name) => println!("{name}\n"),
            None => println!("{}\n", "(not yet discovered)".warning()),
        }

        if view.status == SubjectStatus::Resolved {
            println!("{}", "Metadata".dim());
            if let Some(credits) = view.credits {
                println!("  Credits:   {credits}");
            }
            if let Some(school) = view.school {
                println!("  School:    {school}");
            }
            match view.need_all_requirements {
                Some(true) => println!("  Requires:  prerequisites and restrictions"),
                Some(false) => println!("  Requires:  prerequisites or restrictions"),
                None => {}
            }
        }

        if !view.restrictions.is_empty() {
            println!("\n{}", "Restrictions".dim());
            for restriction in view.restrictions {
                println!("  • {restriction}");
            }
        }

        if !view.prerequisites.is_empty() {
            println!("\n{}", "Prerequisites (any one group)".dim());
            for group in &view.prerequisites {
                let atoms: Vec<_> = group
                    .iter()
                    .map(|atom| {
                        if atom.corequisite {
                            format!("{}(c)", atom.subject.code)
                        } else {
                            atom.subject.code.to_string()
                        }
                    })
                    .collect();
                println!("  • {}", atoms.join(" y "));
            }
        }

        if !view.equivalencies.is_empty() {
            println!("\n{}", "Equivalencies".dim());
            for group in &view.equivalencies {
                let codes: Vec<_> = group.iter().map(|s| s.code.as_str()).collect();
                println!("  • {}", codes.join(" y "));
            }
        }

        if !view.unlocks.is_empty() {
            println!("\n{}", "Unlocks".dim());
            for subject in &view.unlocks {
                match subject.name {
                    Some(name) => println!("  • {} {}", subject.code, name.dim()),
                    None => println!("  • {}", subject.code),
                }
            }
        }
    }
}
