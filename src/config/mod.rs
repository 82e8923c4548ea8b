pub mod types;

pub use types::{Config, EndpointConfig, LogStorageConfig, ResolvedLogConfig};

use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(&yaml_string);

    let config: Config = serde_yaml::from_str(&yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let LogStorageConfig::Auto(marker) = &config.log {
        if marker != "auto" {
            return Err(ConfigError::Validation(format!(
                "log must be the string 'auto' or a project/log_store pair, got '{marker}'"
            )));
        }
    }

    if config.endpoint.log_url.is_empty() {
        return Err(ConfigError::Validation(
            "endpoint.log_url must not be empty".to_string(),
        ));
    }
    if config.account.account_id.is_empty() {
        return Err(ConfigError::Validation(
            "account.account_id must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    re.replace_all(text, |caps: &regex::Captures| {
        let var_name = caps.get(1).unwrap().as_str();

        std::env::var(var_name)
            .unwrap_or_else(|_| caps.get(0).unwrap().as_str().to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_CONFIG: &str = r#"
endpoint:
  log_url: https://logs.example.com
  registry_url: https://cr.example.com
account:
  account_id: "123456789"
  region: us-west-1
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_defaults_to_auto() {
        let file = write_config(MINIMAL_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert!(config.log.is_auto());
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.realtime.max_iterations, 1800);
        assert_eq!(config.endpoint.timeout_seconds, 30);
    }

    #[test]
    fn test_explicit_log_config() {
        let contents = format!(
            "{MINIMAL_CONFIG}log:\n  project: my-project\n  log_store: my-store\n"
        );
        let file = write_config(&contents);
        let config = load_config(file.path()).unwrap();

        match config.log {
            LogStorageConfig::Explicit { project, log_store } => {
                assert_eq!(project, "my-project");
                assert_eq!(log_store, "my-store");
            }
            other => panic!("expected explicit config, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_auto_marker_rejected() {
        let contents = format!("{MINIMAL_CONFIG}log: automatic\n");
        let file = write_config(&contents);

        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("LOGSHIP_TEST_REGION", "eu-central-1");
        let expanded = expand_env_vars("region: $env{LOGSHIP_TEST_REGION}");
        assert_eq!(expanded, "region: eu-central-1");

        // Unset variables are left untouched
        let untouched = expand_env_vars("region: $env{LOGSHIP_TEST_UNSET_VAR}");
        assert_eq!(untouched, "region: $env{LOGSHIP_TEST_UNSET_VAR}");
    }
}
