use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{dnf::DEFAULT_MAX_GROUPS, expression::DEFAULT_MAX_DEPTH};

/// Configuration for catalog discovery and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// A search returning at least this many subjects is repeated one level
    /// deeper in the code space instead of being ingested.
    ///
    /// Catalog searches are truncated, so a full page means subjects may be
    /// missing from it.
    deepen_threshold: usize,

    /// Upper bound on the number of groups a requirement may expand to.
    max_groups: usize,

    /// How deeply parentheses may nest in requirement text.
    max_depth: usize,

    /// Whether codes that failed during a discovery pass are retried once
    /// with a fresh session.
    pub retry_failures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deepen_threshold: default_deepen_threshold(),
            max_groups: DEFAULT_MAX_GROUPS,
            max_depth: DEFAULT_MAX_DEPTH,
            retry_failures: true,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the result count at which a search is deepened.
    #[must_use]
    pub const fn deepen_threshold(&self) -> usize {
        self.deepen_threshold
    }

    /// Returns the group limit for normalization.
    #[must_use]
    pub const fn max_groups(&self) -> usize {
        self.max_groups
    }

    /// Returns the nesting limit for requirement text.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets the deepen threshold. Zero is raised to one.
    pub fn set_deepen_threshold(&mut self, threshold: usize) {
        self.deepen_threshold = threshold.max(1);
    }

    /// Sets the group limit. Zero is raised to one.
    pub fn set_max_groups(&mut self, max_groups: usize) {
        self.max_groups = max_groups.max(1);
    }

    /// Sets the nesting limit. Zero is raised to one.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
    }
}

const fn default_deepen_threshold() -> usize {
    50
}

const fn default_max_groups() -> usize {
    DEFAULT_MAX_GROUPS
}

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_deepen_threshold")]
        deepen_threshold: usize,

        #[serde(default = "default_max_groups")]
        max_groups: usize,

        #[serde(default = "default_max_depth")]
        max_depth: usize,

        #[serde(default = "default_true")]
        retry_failures: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                deepen_threshold,
                max_groups,
                max_depth,
                retry_failures,
            } => Self {
                deepen_threshold: deepen_threshold.max(1),
                max_groups: max_groups.max(1),
                max_depth: max_depth.max(1),
                retry_failures,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            deepen_threshold: config.deepen_threshold,
            max_groups: config.max_groups,
            max_depth: config.max_depth,
            retry_failures: config.retry_failures,
        }
    }
}
