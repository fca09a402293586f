use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SigmaflowConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse a YAML document after environment variable substitution
pub fn parse_config(content: &str) -> Result<SigmaflowConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    // An empty file is a valid, fully defaulted configuration
    if substituted.trim().is_empty() {
        return Ok(SigmaflowConfig::default());
    }

    let config: SigmaflowConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> SigmaflowConfig {
    SigmaflowConfig {
        provider: Some(ProviderConfig::default()),
        session: Some(SessionConfig::default()),
        logging: Some(LoggingConfig::default()),
        metrics: Some(MetricsConfig::default()),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &SigmaflowConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_content() {
        let config = parse_config("   \n").unwrap();
        assert!(config.session.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(parse_config("provider: [unterminated").is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "sigmaflow-config-{}.yaml",
            std::process::id()
        ));
        let mut config = generate_default_config();
        if let Some(session) = config.session.as_mut() {
            session.ticker_timeout_secs = 30;
        }

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.session().ticker_timeout_secs, 30);
        assert_eq!(loaded.provider().host, "127.0.0.1");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/sigmaflow.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
