use crate::config::types::{
    Config, DelayRange, FetchConfig, OutputConfig, PacingConfig, ProxyConfig, SelectorConfig,
};
use crate::ConfigError;
use scraper::Selector;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_pacing_config(&config.pacing)?;
    validate_proxy_config(&config.proxy)?;
    validate_selectors(&config.selectors)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_lightweight_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-lightweight-attempts must be >= 1, got {}",
            config.max_lightweight_attempts
        )));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) must not exceed backoff-max-ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    validate_range("standard-delay-ms", &config.standard_delay_ms)?;
    validate_range("category-delay-ms", &config.category_delay_ms)?;
    validate_range("failure-delay-ms", &config.failure_delay_ms)?;
    validate_range("settle-delay-ms", &config.settle_delay_ms)?;
    Ok(())
}

fn validate_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if range.min_ms > range.max_ms {
        return Err(ConfigError::Validation(format!(
            "{} must be [min, max] with min <= max, got [{}, {}]",
            name, range.min_ms, range.max_ms
        )));
    }
    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    match (&config.host, config.port) {
        (Some(host), Some(_)) if host.trim().is_empty() => Err(ConfigError::Validation(
            "proxy host cannot be empty".to_string(),
        )),
        (Some(_), Some(_)) | (None, None) => Ok(()),
        _ => Err(ConfigError::Validation(
            "proxy host and port must be configured together".to_string(),
        )),
    }
}

fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.listing,
        &config.advertisement,
        &config.name,
        &config.address,
        &config.phone_icon,
        &config.image,
        &config.background_image,
        &config.verified,
    ] {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if !is_safe_file_stem(&config.default_dataset) {
        return Err(ConfigError::Validation(format!(
            "default-dataset must contain only letters, digits, '-' and '_', got '{}'",
            config.default_dataset
        )));
    }

    Ok(())
}

/// Returns true if `name` can be used as a file name without escaping
pub fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.fetch.max_lightweight_attempts = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_backoff_base_above_max_rejected() {
        let mut config = Config::default();
        config.fetch.backoff_base_ms = 60_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut config = Config::default();
        config.pacing.failure_delay_ms = DelayRange::new(15_000, 10_000);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_half_configured_proxy_rejected() {
        let mut config = Config::default();
        config.proxy.host = Some("proxy.internal".to_string());
        assert!(validate(&config).is_err());

        config.proxy.port = Some(8080);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut config = Config::default();
        config.selectors.verified = "div[".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_is_safe_file_stem() {
        assert!(is_safe_file_stem("businesses"));
        assert!(is_safe_file_stem("category_car-rental"));

        assert!(!is_safe_file_stem(""));
        assert!(!is_safe_file_stem("../etc"));
        assert!(!is_safe_file_stem("a b"));
    }
}
