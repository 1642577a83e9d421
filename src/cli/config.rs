use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;
use tracing::{info, debug};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProberConfig {
    pub scraper: ScraperSettings,
    pub retry: RetrySettings,
}

/// Scraper-specific settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScraperSettings {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub politeness_delay_ms: u64,  // Delay between probes of the same page
    pub concurrency: usize,        // Pages searched at once
    pub default_pages: u32,
    pub default_radius: u32,
    pub selectors: Selectors,
    pub archive_prefix: String,
}

/// CSS selectors for the article page
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Selectors {
    pub image: String,
    pub title: String,
    pub text: String,
}

/// Retry policy for transient fetch failures
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,  // Retries after the first attempt
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

pub const MAX_PAGES: u32 = 20;
pub const MAX_RADIUS: u32 = 100;
pub const MAX_CONCURRENCY: usize = 8;

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            request_timeout_secs: 10,
            politeness_delay_ms: 500,
            concurrency: 4,
            default_pages: 4,
            default_radius: 50,
            selectors: Selectors::default(),
            archive_prefix: "epaper".to_string(),
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            image: "img#current_artical".to_string(),
            title: "div.article_title".to_string(),
            text: "div.article_text".to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ScraperSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    /// Worker count clamped to 1..=MAX_CONCURRENCY
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl ProberConfig {
    /// Get the path to the config directory, creating its `sites` folder
    fn config_dir() -> Result<PathBuf> {
        let base = directories::ProjectDirs::from("com", "paper-prober", "paper-prober")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./config"));

        Self::prepare_config_dir(base)
    }

    fn prepare_config_dir(base: PathBuf) -> Result<PathBuf> {
        let sites = base.join("sites");
        fs::create_dir_all(&sites)
            .context(format!("Failed to create config directory: {}", sites.display()))?;
        Ok(base)
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        let config_path = config_dir.join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let config_dir = Self::config_dir()?;
        let profile_path = config_dir.join("sites").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load `default` or a named profile
    pub fn load(profile: &str) -> Result<Self> {
        if profile == "default" {
            Self::load_default()
        } else {
            Self::load_profile(profile)
        }
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))
    }

    /// Parse YAML; missing keys take their defaults
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scraper;
        if s.default_pages == 0 || s.default_pages > MAX_PAGES {
            anyhow::bail!("default_pages must be between 1 and {}", MAX_PAGES);
        }
        if s.default_radius > MAX_RADIUS {
            anyhow::bail!("default_radius must be at most {}", MAX_RADIUS);
        }
        if s.archive_prefix.trim().is_empty() {
            anyhow::bail!("archive_prefix must not be empty");
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            anyhow::bail!("backoff_multiplier must be a finite number of at least 1.0");
        }
        Ok(())
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        let config_path = config_dir.join("default.yaml");

        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<()> {
        let config_dir = Self::config_dir()?;
        let profile_path = config_dir.join("sites").join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)
    }

    /// Save the configuration to a file
    fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let sites_dir = Self::config_dir()?.join("sites");

        if !sites_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(sites_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}
