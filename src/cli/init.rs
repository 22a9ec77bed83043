use std::path::Path;

use clap::Parser;
use course_catalog::{Config, storage::CONFIG_FILE};
use tracing::instrument;

#[derive(Debug, Parser)]
#[command(about = "Write a default configuration file")]
pub struct Init {
    /// Result count at which discovery searches a prefix one level deeper
    #[arg(long, value_name = "COUNT")]
    deepen_threshold: Option<usize>,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!("Catalog already initialized (found existing {CONFIG_FILE})");
        }

        std::fs::create_dir_all(root)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", root.display()))?;

        let mut config = Config::default();
        if let Some(threshold) = self.deepen_threshold {
            config.set_deepen_threshold(threshold);
        }
        config
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

        println!("Initialized catalog in {}", root.display());
        println!("  Created: {CONFIG_FILE}");
        println!();
        println!("Next steps:");
        println!("  catalogo import subjects.json");

        Ok(())
    }
}
