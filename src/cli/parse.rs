use std::path::Path;

use clap::Parser;
use course_catalog::{
    Dnf, Normalizer,
    domain::{
        Restriction,
        expression::{AmbiguousOperator, Parser as ExpressionParser, tokenize},
        parse_restrictions,
    },
    storage::load_config,
};
use serde::Serialize;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Parse a requirement expression and print its normal form")]
pub struct Parse {
    /// The requirement text, e.g. "(IIC1103 y MAT1610) o IIC1102(c)"
    text: String,

    /// Restriction text to parse alongside, e.g. "(Nivel = Pregrado)"
    #[arg(long, value_name = "TEXT")]
    restrictions: Option<String>,

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

#[derive(Debug, Serialize)]
struct Parsed {
    dnf: Dnf,
    warnings: Vec<AmbiguousOperator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restrictions: Option<Vec<Restriction>>,
}

impl Parse {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let normalizer = Normalizer::new(config.max_groups()).with_max_depth(config.max_depth());
        let parsed = self.parse(normalizer)?;

        match self.output {
            OutputFormat::Pretty => Self::output_pretty(&parsed),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
        }
        Ok(())
    }

    fn parse(&self, normalizer: Normalizer) -> anyhow::Result<Parsed> {
        let tokens = tokenize(&self.text)?;
        let parsed = ExpressionParser::new(&tokens)
            .with_max_depth(normalizer.max_depth())
            .parse()?;
        let dnf = parsed
            .expr
            .map_or_else(|| Ok(Dnf::none()), |expr| normalizer.normalize(&expr))?;

        let restrictions = match &self.restrictions {
            Some(text) => Some(
                parse_restrictions(text)
                    .ok_or_else(|| anyhow::anyhow!("Unrecognised restrictions: {text}"))?,
            ),
            None => None,
        };

        Ok(Parsed {
            dnf,
            warnings: parsed.warnings,
            restrictions,
        })
    }

    fn output_pretty(parsed: &Parsed) {
        println!("{}", parsed.dnf.to_string().info());

        if !parsed.dnf.is_empty() {
            println!("\n{}", "Groups".dim());
            for (i, group) in parsed.dnf.iter().enumerate() {
                println!("  {i}: {group}");
            }
        }

        if !parsed.warnings.is_empty() {
            println!("\n{}", "Warnings".dim());
            for warning in &parsed.warnings {
                println!("  {}", warning.to_string().warning());
            }
        }

        if let Some(restrictions) = &parsed.restrictions {
            println!("\n{}", "Restrictions".dim());
            if restrictions.is_empty() {
                println!("  none");
            }
            for restriction in restrictions {
                println!("  • {restriction}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, restrictions: Option<&str>) -> anyhow::Result<Parsed> {
        Parse {
            text: text.to_string(),
            restrictions: restrictions.map(ToString::to_string),
            output: OutputFormat::Json,
        }
        .parse(Normalizer::default())
    }

    #[test]
    fn reports_normal_form_and_warnings() {
        let parsed = parse("IIC1103 y MAT1610 o MAT1620", None).unwrap();
        assert_eq!(parsed.dnf.to_string(), "IIC1103 y MAT1610 y MAT1620");
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.restrictions.is_none());
    }

    #[test]
    fn parses_restrictions_when_given() {
        let parsed = parse("No tiene", Some("(Nivel = Pregrado)")).unwrap();
        assert!(parsed.dnf.is_empty());
        assert_eq!(
            parsed.restrictions,
            Some(vec![Restriction::new("Nivel", "Pregrado")])
        );
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(parse("IIC1103 y", None).is_err());
        assert!(parse("IIC1103", Some("Nivel Pregrado")).is_err());
    }

    #[test]
    fn nesting_limit_comes_from_the_normalizer() {
        let cmd = Parse {
            text: "((IIC1103))".to_string(),
            restrictions: None,
            output: OutputFormat::Pretty,
        };
        assert!(cmd.parse(Normalizer::default()).is_ok());
        assert!(cmd.parse(Normalizer::default().with_max_depth(1)).is_err());
    }
}
