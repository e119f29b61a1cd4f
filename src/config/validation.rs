use crate::config::types::{
    Config, DownloaderSection, HarvestConfig, OptimisationCacheConfig, OutputConfig, StoreConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_downloader_config(&config.downloader)?;
    validate_store_config(&config.store)?;
    validate_output_config(&config.output)?;
    if let Some(cache) = &config.optimisation_cache {
        validate_optimisation_cache_config(cache)?;
    }
    Ok(())
}

/// Validates the harvest section
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if config.main_page.is_empty() {
        return Err(ConfigError::Validation(
            "main-page cannot be empty".to_string(),
        ));
    }

    if config.speed < 1 || config.speed > 100 {
        return Err(ConfigError::Validation(format!(
            "speed must be between 1 and 100, got {}",
            config.speed
        )));
    }

    if !config.article_path_prefix.starts_with('/') || !config.article_path_prefix.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "article-path-prefix must start and end with '/', got '{}'",
            config.article_path_prefix
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate tool name: non-empty, alphanumeric + hyphens only
    if config.name.is_empty() {
        return Err(ConfigError::Validation("name cannot be empty".to_string()));
    }

    if !config.name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the downloader section
fn validate_downloader_config(config: &DownloaderSection) -> Result<(), ConfigError> {
    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-ms must be >= 100, got {}",
            config.request_timeout_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.bundle_dir.is_empty() {
        return Err(ConfigError::Validation(
            "bundle-dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the optional optimisation cache section
fn validate_optimisation_cache_config(config: &OptimisationCacheConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid optimisation-cache base-url: {}", e))
    })?;
    Ok(())
}

/// Basic email validation: one '@' with non-empty local and domain parts
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "contact-email is not a valid email address: '{}'",
            email
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        toml::from_str(
            r#"
[harvest]
base-url = "https://wiki.example.com/"
main-page = "Main_Page"
speed = 8

[user-agent]
name = "wikimirror"
version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[downloader]
request-timeout-ms = 30000
max-retries = 3

[store]
database-path = "./cache.db"

[output]
bundle-dir = "./bundle"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_speed_out_of_range_rejected() {
        let mut config = valid_config();
        config.harvest.speed = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        config.harvest.speed = 101;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let mut config = valid_config();
        config.harvest.base_url = "ftp://wiki.example.com/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_short_timeout_rejected() {
        let mut config = valid_config();
        config.downloader.request_timeout_ms = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_article_prefix_rejected() {
        let mut config = valid_config();
        config.harvest.article_path_prefix = "wiki/".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut config = valid_config();
        config.user_agent.contact_email = "not-an-email".to_string();
        assert!(validate(&config).is_err());
    }
}
