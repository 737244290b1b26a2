//! Configuration management for Shipguard
//!
//! Configuration is layered with figment: compiled defaults, then the user file,
//! then the repository file, then `SHIPGUARD_` environment variables. Every section
//! carries `#[serde(default)]` so partial files only override what they name.

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod smart_load;

/// Main configuration structure for Shipguard
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ShipguardConfig {
    /// Security gate configuration
    pub gate: GateConfig,

    /// Hardcoded credential heuristic
    pub heuristic: HeuristicConfig,

    /// Review feedback loop
    pub review: ReviewConfig,
}

/// Security gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Revision the change set is measured against
    pub base_ref: String,

    /// Ignore file audited before every gate run, relative to the work tree
    pub ignore_file: String,

    /// Entries that must be present in the ignore file
    pub required_ignores: Vec<String>,

    /// Path globs never scanned (template and example files)
    pub exclusions: Vec<String>,

    /// File name globs identifying environment files that must never be staged
    pub env_file_patterns: Vec<String>,

    /// Also scan staged-but-uncommitted content
    pub scan_staged: bool,

    /// Extra signatures appended after the built-in library
    pub custom_patterns: Vec<CustomPatternConfig>,
}

/// User-defined secret signature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomPatternConfig {
    pub label: String,
    pub regex: String,
}

/// Hardcoded credential heuristic configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Key name stems that make an assignment credential-shaped
    pub key_stems: Vec<String>,

    /// Minimum length of the assigned opaque value
    pub min_value_length: usize,

    /// Case-insensitive markers that suppress a match on the same line
    pub suppression_markers: Vec<String>,
}

/// Review feedback loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    pub max_iterations: u32,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,

    /// Case-insensitive substrings identifying reviewer-bot accounts
    pub reviewer_identities: Vec<String>,

    pub blocking_keywords: Vec<String>,
    pub suggestion_keywords: Vec<String>,

    /// Directory for iteration artifacts, relative to the work tree
    pub feedback_dir: String,

    pub remote: String,

    /// External program invoked with the feedback file to apply fixes
    pub fix_command: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_ref: "origin/main".to_string(),
            ignore_file: ".gitignore".to_string(),
            required_ignores: strings(&[
                ".env",
                ".env.local",
                ".env.*.local",
                "*.pem",
                "*.key",
                "id_rsa",
                "id_ed25519",
                ".review-feedback/",
            ]),
            exclusions: strings(&["**/*example*", "**/*.template", "**/*.sample"]),
            env_file_patterns: strings(&[".env", ".env.*"]),
            scan_staged: true,
            custom_patterns: vec![],
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            key_stems: strings(&["key", "secret", "password", "token", "auth", "credential"]),
            min_value_length: 20,
            suppression_markers: strings(&[
                "example",
                "placeholder",
                "your_",
                "your-",
                "xxx",
                "changeme",
                "dummy",
                "sample",
                "${",
                "{{",
                "process.env",
                "os.environ",
            ]),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            poll_interval_secs: 30,
            max_poll_attempts: 10,
            reviewer_identities: strings(&["claude", "bot", "github-actions"]),
            blocking_keywords: strings(&[
                "must fix",
                "critical",
                "security",
                "error",
                "bug",
                "vulnerability",
                "blocking",
            ]),
            suggestion_keywords: strings(&[
                "consider",
                "optional",
                "nit",
                "suggestion",
                "could",
                "might",
            ]),
            feedback_dir: ".review-feedback".to_string(),
            remote: "origin".to_string(),
            fix_command: None,
        }
    }
}

/// Serialization format for `config show` and `config init`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Toml,
    Yaml,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Toml => "toml",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Json => "json",
        }
    }
}

impl ShipguardConfig {
    /// Serialize the effective configuration
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        Ok(match format {
            ExportFormat::Toml => {
                toml::to_string_pretty(self).context("Failed to serialize configuration as TOML")?
            }
            ExportFormat::Yaml => {
                serde_yml::to_string(self).context("Failed to serialize configuration as YAML")?
            }
            ExportFormat::Json => serde_json::to_string_pretty(self)
                .context("Failed to serialize configuration as JSON")?,
        })
    }

    /// Required ignore-file entries, including the feedback artifact directory
    pub fn required_ignores(&self) -> Vec<String> {
        let mut required = self.gate.required_ignores.clone();
        let feedback_entry = format!("{}/", self.review.feedback_dir.trim_end_matches('/'));
        if !required.contains(&feedback_entry) {
            required.push(feedback_entry);
        }
        required
    }
}

impl ReviewConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl ShipguardConfig {
    /// Load configuration from the standard locations
    pub fn load(custom_config: Option<&str>) -> Result<Self> {
        Self::figment(custom_config, Path::new("."))
            .extract()
            .context("Failed to load shipguard configuration")
    }

    /// Build the layered figment without extracting it
    pub fn figment(custom_config: Option<&str>, repo_root: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ShipguardConfig::default()));

        if let Some(custom_path) = custom_config {
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            if let Some(user_dir) = Self::user_config_dir() {
                for name in ["config.toml", "config.yaml", "config.yml", "config.json"] {
                    figment = figment.merge(smart_load::auto(user_dir.join(name)));
                }
            }
            for name in [
                "shipguard.toml",
                "shipguard.yaml",
                "shipguard.yml",
                "shipguard.json",
            ] {
                figment = figment.merge(smart_load::auto(repo_root.join(name)));
            }
        }

        // Environment variables always have highest priority
        figment.merge(Env::prefixed("SHIPGUARD_").split("__"))
    }

    fn user_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("shipguard"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.review.max_iterations == 0 {
            anyhow::bail!("review.max_iterations must be at least 1");
        }
        if self.review.max_poll_attempts == 0 {
            anyhow::bail!("review.max_poll_attempts must be at least 1");
        }
        if self.review.reviewer_identities.is_empty() {
            anyhow::bail!("review.reviewer_identities cannot be empty");
        }
        if self.heuristic.min_value_length < 8 {
            anyhow::bail!("heuristic.min_value_length must be at least 8");
        }
        if self.heuristic.key_stems.is_empty() {
            anyhow::bail!("heuristic.key_stems cannot be empty");
        }

        // Compiling the gate components surfaces bad regexes and globs
        crate::security::PatternRegistry::from_config(&self.gate)?;
        crate::git::diff::DiffExtractor::new(&self.gate.exclusions)?;
        crate::security::CredentialHeuristic::from_config(&self.heuristic)?;

        Ok(())
    }
}
