use crate::renderer::Mode;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for wikimirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub downloader: DownloaderSection,
    pub store: StoreConfig,
    pub output: OutputConfig,
    /// Absent section disables the optimisation cache path entirely.
    #[serde(rename = "optimisation-cache", default)]
    pub optimisation_cache: Option<OptimisationCacheConfig>,
}

/// Target-site and run-shape configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Base URL of the target site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Render mode: "desktop", "mobile", "auto", or a renderer name
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Identifier of the site's main page; also the default probe page
    #[serde(rename = "main-page")]
    pub main_page: String,

    /// Known-to-exist page probed at startup; defaults to the main page
    #[serde(rename = "probe-page", default)]
    pub probe_page: Option<String>,

    /// Concurrency multiplier for fetch fan-out
    pub speed: u32,

    /// Path prefix of the article tree on the target site
    #[serde(rename = "article-path-prefix", default = "default_article_prefix")]
    pub article_path_prefix: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the mirror tool
    pub name: String,

    /// Version of the mirror tool
    pub version: String,

    /// URL with information about the tool
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloaderSection {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Maximum retry attempts for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Substitute WebP paths for eligible image types
    #[serde(default)]
    pub webp: bool,
}

/// Cache-store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the bundle tree is written into
    #[serde(rename = "bundle-dir")]
    pub bundle_dir: String,
}

/// Remote optimisation cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OptimisationCacheConfig {
    #[serde(rename = "base-url")]
    pub base_url: String,
}

fn default_mode() -> String {
    "auto".to_string()
}

fn default_article_prefix() -> String {
    "/wiki/".to_string()
}

impl Config {
    /// User-agent string sent with every request.
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.user_agent.name,
            self.user_agent.version,
            self.user_agent.contact_url,
            self.user_agent.contact_email
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.downloader.request_timeout_ms)
    }

    pub fn mode(&self) -> Mode {
        self.harvest
            .mode
            .parse()
            .unwrap_or(Mode::Auto)
    }

    pub fn probe_page(&self) -> &str {
        self.harvest
            .probe_page
            .as_deref()
            .unwrap_or(&self.harvest.main_page)
    }
}
