use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Environment variables that override values from the configuration file
pub const ENV_PORT: &str = "PORT";
pub const ENV_PROXY_HOST: &str = "PROXY_HOST";
pub const ENV_PROXY_PORT: &str = "PROXY_PORT";
pub const ENV_CHROME_PATH: &str = "CHROME_EXECUTABLE_PATH";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides (`PORT`, `PROXY_HOST`, `PROXY_PORT`,
/// `CHROME_EXECUTABLE_PATH`) are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use biz_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Output directory: {}", config.output.directory.display());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    validate(&config)?;

    Ok(config)
}

/// Parses configuration text without touching the environment or validating
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Applies environment overrides using `lookup` to read variables
///
/// Taking the lookup as a closure keeps tests independent of the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = parse_port(ENV_PORT, &port)?;
    }

    if let Some(host) = lookup(ENV_PROXY_HOST).filter(|h| !h.trim().is_empty()) {
        config.proxy.host = Some(host.trim().to_string());
    }

    if let Some(port) = lookup(ENV_PROXY_PORT) {
        config.proxy.port = Some(parse_port(ENV_PROXY_PORT, &port)?);
    }

    if let Some(path) = lookup(ENV_CHROME_PATH).filter(|p| !p.trim().is_empty()) {
        config.browser.executable_path = Some(PathBuf::from(path.trim()));
    }

    Ok(())
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| {
        ConfigError::Validation(format!("{} must be a port number, got '{}'", name, value))
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at start-up so runs can be matched to the configuration they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
[fetch]
timeout-secs = 15
max-lightweight-attempts = 4
backoff-base-ms = 500
backoff-max-ms = 8000

[pacing]
standard-delay-ms = [100, 200]
category-delay-ms = [300, 400]
failure-delay-ms = [500, 600]
settle-delay-ms = [700, 800]
early-stop-window = 3
seed = 42

[browser]
enabled = false
executable-path = "/usr/bin/chromium"

[proxy]
host = "proxy.internal"
port = 3128

[selectors]
listing = "article.biz"

[output]
directory = "/tmp/harvest"
default-dataset = "all_businesses"

[server]
bind = "127.0.0.1"
port = 8081
"#,
        )
        .unwrap();

        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.max_lightweight_attempts, 4);
        assert_eq!(config.pacing.standard_delay_ms, DelayRange::new(100, 200));
        assert_eq!(config.pacing.settle_delay_ms, DelayRange::new(700, 800));
        assert_eq!(config.pacing.early_stop_window, 3);
        assert_eq!(config.pacing.seed, Some(42));
        assert!(!config.browser.enabled);
        assert_eq!(config.proxy.url().as_deref(), Some("http://proxy.internal:3128"));
        assert_eq!(config.selectors.listing, "article.biz");
        assert_eq!(config.selectors.name, ".listing-name a, .listing-name");
        assert_eq!(config.output.default_dataset, "all_businesses");
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.fetch.max_lightweight_attempts, 3);
        assert_eq!(config.fetch.backoff_max_ms, 30_000);
        assert_eq!(config.pacing.failure_delay_ms, DelayRange::new(10_000, 15_000));
        assert!(config.browser.enabled);
        assert_eq!(config.proxy.url(), None);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_valid_config_file() {
        let file = create_temp_config("[output]\ndefault-dataset = \"listings\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.output.default_dataset, "listings");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[pacing]\nstandard-delay-ms = [5000, 1000]\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_PORT, "9090"),
                (ENV_PROXY_HOST, "10.0.0.5"),
                (ENV_PROXY_PORT, "8888"),
                (ENV_CHROME_PATH, "/opt/chrome/chrome"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.proxy.server().as_deref(), Some("10.0.0.5:8888"));
        assert_eq!(
            config.browser.executable_path,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
    }

    #[test]
    fn test_env_overrides_reject_bad_port() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[(ENV_PORT, "eighty")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[(ENV_PROXY_HOST, "  ")])).unwrap();
        assert_eq!(config.proxy.host, None);
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");
        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");
        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
