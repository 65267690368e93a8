use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::DriverConfig;
use crate::instrument::SessionConfig;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub driver: DriverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    /// VISA-style resource name, e.g. `TCPIP0::192.168.1.40::5025::SOCKET`
    pub resource: String,
    pub timeout_ms: u64,
    /// Path to a simulation profile; replaces the real instrument when set
    pub simulation: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            resource: "TCPIP0::127.0.0.1::5025::SOCKET".to_string(),
            timeout_ms: 5000,
            simulation: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_millis(self.instrument.timeout_ms),
            simulation: self.instrument.simulation.as_ref().map(PathBuf::from),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.resource.trim().is_empty() && self.instrument.simulation.is_none() {
            return Err(ConfigError::Message(
                "instrument.resource must be set".to_string(),
            ));
        }
        if self.instrument.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "instrument.timeout_ms must be positive".to_string(),
            ));
        }
        if self.driver.max_error_drain == 0 {
            return Err(ConfigError::Message(
                "driver.max_error_drain must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overrides such as `SIGGEN__INSTRUMENT__RESOURCE` or
/// `SIGGEN__DRIVER__KNOWN_MODELS=SMA100A,SMB100A`
fn environment() -> Environment {
    Environment::with_prefix("SIGGEN")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("driver.known_models")
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_layered(config_path, environment())
}

fn load_layered(config_path: Option<&Path>, env: Environment) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        let possible_paths = ["siggen.toml", "config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    builder = builder.add_source(env);

    let config = builder.build()?.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, falling back to defaults and handing back the error
/// that caused the fallback. Nothing is logged.
pub fn load_config_with_fallback(config_path: Option<&Path>) -> (AppConfig, Option<ConfigError>) {
    match load_config(config_path) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    }
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config_with_fallback(config_path) {
        (config, None) => {
            log::info!("Configuration loaded successfully");
            config
        }
        (config, Some(e)) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    /// Layered load that sees only the given variables, not the process
    /// environment.
    fn load_with_env(path: Option<&Path>, vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_layered(path, environment().source(Some(vars)))
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rf_siggen_cfg_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_file(
            "lab.toml",
            r#"
[instrument]
resource = "GPIB0::28::INSTR"
timeout_ms = 2000

[driver]
confirm_commands = false
known_models = ["SMB100A"]
"#,
        );
        let config = load_with_env(Some(path.as_path()), &[]).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.instrument.resource, "GPIB0::28::INSTR");
        assert_eq!(config.session_config().timeout, Duration::from_millis(2000));
        assert!(config.session_config().simulation.is_none());
        assert!(!config.driver.confirm_commands);
        assert_eq!(config.driver.known_models, vec!["SMB100A".to_string()]);
        assert_eq!(config.driver.max_error_drain, DriverConfig::default().max_error_drain);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("siggen.example.toml");
        let config = load_with_env(Some(path.as_path()), &[]).unwrap();
        assert_eq!(config.instrument.resource, "TCPIP0::192.168.1.40::5025::SOCKET");
        assert_eq!(config.driver, DriverConfig::default());
    }

    #[test]
    fn test_simulation_path() {
        let path = temp_file(
            "sim.toml",
            "[instrument]\nsimulation = \"profiles/sma100a.toml\"\n",
        );
        let config = load_with_env(Some(path.as_path()), &[]).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            config.session_config().simulation,
            Some(PathBuf::from("profiles/sma100a.toml"))
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("rf_siggen_missing_config.toml");
        assert!(load_config(Some(missing.as_path())).is_err());
        let config = load_config_or_default(Some(missing.as_path()));
        assert_eq!(config.instrument.timeout_ms, 5000);

        let (config, error) = load_config_with_fallback(Some(missing.as_path()));
        assert!(error.is_some_and(|e| e.to_string().contains("not found")));
        assert_eq!(config.instrument.resource, AppConfig::default().instrument.resource);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_file("env.toml", "[instrument]\nresource = \"GPIB0::28::INSTR\"\n");
        let config = load_with_env(
            Some(path.as_path()),
            &[
                ("SIGGEN__INSTRUMENT__RESOURCE", "GPIB0::7::INSTR"),
                ("SIGGEN__DRIVER__KNOWN_MODELS", "SMB100A,SMW200A"),
                ("SIGGEN__DRIVER__CONFIRM_COMMANDS", "false"),
                ("OTHER__INSTRUMENT__TIMEOUT_MS", "1"),
            ],
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.instrument.resource, "GPIB0::7::INSTR");
        assert_eq!(config.instrument.timeout_ms, 5000);
        assert!(!config.driver.confirm_commands);
        assert_eq!(
            config.driver.known_models,
            vec!["SMB100A".to_string(), "SMW200A".to_string()]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = temp_file("zero.toml", "[instrument]\ntimeout_ms = 0\n");
        let result = load_with_env(Some(path.as_path()), &[]);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
