use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::SymbiosisConfig;

/// Loads the Symbiosis configuration.
pub struct ConfigLoader {
    config: SymbiosisConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SYMBIOSIS_CONFIG env > ~/.symbiosis/symbiosis.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SYMBIOSIS_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".symbiosis")
            .join("symbiosis.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> symbiosis_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SymbiosisConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config);

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(symbiosis_core::SymbiosisError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, path: &Path) -> symbiosis_core::Result<SymbiosisConfig> {
        toml::from_str::<SymbiosisConfig>(raw).map_err(|e| {
            symbiosis_core::SymbiosisError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> SymbiosisConfig {
        self.config.clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (SYMBIOSIS_MODEL, SYMBIOSIS_BACKEND_URL, etc.)
    fn apply_env_overrides(config: SymbiosisConfig) -> SymbiosisConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(mut config: SymbiosisConfig, lookup: F) -> SymbiosisConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SYMBIOSIS_MODEL") {
            config.agent.model = v;
        }
        if let Some(v) = lookup("SYMBIOSIS_SUBJECT") {
            config.agent.subject_name = v;
        }
        if let Some(v) = lookup("SYMBIOSIS_BACKEND_URL") {
            config.memory.backend_url = Some(v);
        }
        if let Some(v) = lookup("SYMBIOSIS_LOG_LEVEL") {
            config.logging.level = v;
        }
        // API key: env var fills in when config file doesn't have the key set.
        if config.services.openrouter_api_key.is_none()
            && let Some(v) = lookup("OPENROUTER_API_KEY")
        {
            config.services.openrouter_api_key = Some(v);
        }
        config
    }
}
